//! Property and scenario tests for parse → resolve → validate
//!
//! Covers:
//! - single statements survive parsing and resolution unchanged
//! - inheritance keeps base properties and lets the child override
//! - extends cycles terminate with a CIRCULAR_DEPENDENCY error
//! - missing variables are kept literally and reported exactly once
//! - JSON paths are never substituted

use chartwell_core::{lookup_path, ConfigValue, VariableSet};
use chartwell_dsl::{
    parse, resolve, resolve_named, to_dsl, validate_schema, ResolutionErrorCode, SchemaRegistry,
};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// STRATEGIES
// ============================================================================

fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z_][a-zA-Z0-9_]{0,8}".prop_filter("boolean keyword", |s| s != "true" && s != "false")
}

fn arb_path() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(arb_segment(), 1..5).prop_filter("reserved key", |path| {
        !matches!(path[0].as_str(), "extends" | "source" | "map")
    })
}

/// A literal DSL value and the config value it must produce.
fn arb_literal() -> impl Strategy<Value = (String, ConfigValue)> {
    prop_oneof![
        "[a-zA-Z0-9 _.,!?-]{0,16}".prop_map(|s| (format!("\"{}\"", s), ConfigValue::String(s))),
        (-100_000i64..100_000).prop_map(|n| (n.to_string(), ConfigValue::Number(n as f64))),
        (0u32..10_000, 1u32..100).prop_map(|(whole, frac)| {
            let text = format!("{}.{:02}", whole, frac);
            let value = text.parse::<f64>().unwrap_or_default();
            (text, ConfigValue::Number(value))
        }),
        any::<bool>().prop_map(|b| (b.to_string(), ConfigValue::Bool(b))),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_single_statement_resolves_to_literal(
        path in arb_path(),
        (text, expected) in arb_literal(),
    ) {
        let dotted = path.join(".");
        let source = format!("{}: {};", dotted, text);

        let parsed = parse(&source);
        prop_assert!(parsed.is_ok(), "{:?}", parsed.errors);

        let registry = SchemaRegistry::new();
        let variables = VariableSet::with_defaults();
        let resolved = resolve(&parsed.config, &registry, &variables, None);

        prop_assert!(!resolved.has_errors());
        prop_assert_eq!(lookup_path(&resolved.config, &dotted), Some(&expected));
    }

    #[test]
    fn prop_printed_config_resolves_identically(
        statements in prop::collection::vec((arb_path(), arb_literal()), 1..6)
    ) {
        let source: String = statements
            .iter()
            .map(|(path, (text, _))| format!("{}: {};\n", path.join("."), text))
            .collect();
        let first = parse(&source);
        let second = parse(&to_dsl(&first.config));

        let registry = SchemaRegistry::new();
        let variables = VariableSet::new();
        prop_assert_eq!(
            resolve(&first.config, &registry, &variables, None).config,
            resolve(&second.config, &registry, &variables, None).config
        );
    }
}

// ============================================================================
// INHERITANCE
// ============================================================================

#[test]
fn test_child_overrides_and_inherits_base() {
    let mut registry = SchemaRegistry::new();
    let errors = registry.register_dsl(
        "baseBar",
        r#"
        type: bar;
        options.responsive: true;
        options.plugins.legend.position: "top";
        options.plugins.title.text: "Base";
        "#,
    );
    assert!(errors.is_empty());

    let child = parse(
        r#"
        extends: baseBar;
        options.plugins.title.text: "Quarterly";
        options.maintainAspectRatio: false;
        "#,
    );
    let resolved = resolve(&child.config, &registry, &VariableSet::new(), None);

    assert!(!resolved.has_errors());
    assert_eq!(resolved.dependencies, vec!["baseBar".to_string()]);
    let config = &resolved.config;
    assert_eq!(lookup_path(config, "type"), Some(&ConfigValue::from("bar")));
    assert_eq!(lookup_path(config, "options.responsive"), Some(&ConfigValue::Bool(true)));
    assert_eq!(
        lookup_path(config, "options.plugins.legend.position"),
        Some(&ConfigValue::from("top"))
    );
    assert_eq!(
        lookup_path(config, "options.plugins.title.text"),
        Some(&ConfigValue::from("Quarterly"))
    );
    assert_eq!(
        lookup_path(config, "options.maintainAspectRatio"),
        Some(&ConfigValue::Bool(false))
    );
    assert!(config.get("extends").is_none());
}

#[test]
fn test_three_schema_cycle_terminates() {
    let mut registry = SchemaRegistry::new();
    registry.register_dsl("A", "extends: B; a: 1;");
    registry.register_dsl("B", "extends: C; b: 2;");
    registry.register_dsl("C", "extends: A; c: 3;");

    let resolved = resolve_named("A", &registry, &VariableSet::new(), None);

    let cycles: Vec<_> = resolved
        .errors_with_code(ResolutionErrorCode::CircularDependency)
        .collect();
    assert!(!cycles.is_empty());
    assert!(cycles[0].message.contains("A -> B -> C -> A"));
    for key in ["a", "b", "c"] {
        assert!(resolved.config.contains_key(key), "missing {}", key);
    }
}

#[test]
fn test_missing_base_is_reported_and_child_kept() {
    let child = parse("extends: nowhere; type: line;");
    let resolved = resolve(&child.config, &SchemaRegistry::new(), &VariableSet::new(), None);
    assert_eq!(
        resolved
            .errors_with_code(ResolutionErrorCode::MissingSchema)
            .count(),
        1
    );
    assert_eq!(resolved.config.get("type"), Some(&ConfigValue::from("line")));
}

// ============================================================================
// VARIABLES AND PATHS
// ============================================================================

#[test]
fn test_missing_variable_kept_and_reported_once() {
    let schema = parse("options.color: $accent; options.border: $primary;");
    let resolved = resolve(
        &schema.config,
        &SchemaRegistry::new(),
        &VariableSet::with_defaults(),
        None,
    );

    let missing: Vec<_> = resolved
        .errors_with_code(ResolutionErrorCode::VariableNotFound)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].path.as_deref(), Some("options.color"));
    assert_eq!(
        lookup_path(&resolved.config, "options.color"),
        Some(&ConfigValue::from("$accent"))
    );
    assert_eq!(
        lookup_path(&resolved.config, "options.border"),
        Some(&ConfigValue::from("#3b82f6"))
    );
}

#[test]
fn test_json_paths_are_never_substituted() {
    let variables = VariableSet::new().with("months", "should not appear");
    let schema = parse("map.labels: $.months; options.source: $.months;");
    let resolved = resolve(&schema.config, &SchemaRegistry::new(), &variables, None);

    assert!(!resolved.has_errors());
    assert_eq!(
        lookup_path(&resolved.config, "map.labels"),
        Some(&ConfigValue::from("$.months"))
    );
    assert_eq!(
        lookup_path(&resolved.config, "options.source"),
        Some(&ConfigValue::from("$.months"))
    );
}

#[test]
fn test_interpolations_use_props() {
    let schema = parse(r#"options.plugins.title.text: ${params.region + " sales"};"#);
    let props = json!({"region": "EMEA"});
    let resolved = resolve(
        &schema.config,
        &SchemaRegistry::new(),
        &VariableSet::new(),
        Some(&props),
    );
    assert_eq!(
        lookup_path(&resolved.config, "options.plugins.title.text"),
        Some(&ConfigValue::from("EMEA sales"))
    );
}

#[test]
fn test_resolved_shape_validates() {
    let mut registry = SchemaRegistry::new();
    registry.register_dsl(
        "salesBase",
        r#"type: bar; source: rest("https://api.test/sales"); map.labels: $.months;"#,
    );
    let child = parse("extends: salesBase; map.datasets: $.charts;");
    let resolved = resolve(&child.config, &registry, &VariableSet::new(), None);

    assert_eq!(
        resolved.config.get("source"),
        Some(&ConfigValue::from("https://api.test/sales"))
    );
    assert!(validate_schema(&resolved.config).is_empty());
}
