//! Schema and response validation
//!
//! Validation never fails: it returns a possibly empty list of issues and the
//! caller decides whether to proceed.

use chartwell_core::{is_json_path, keys, ConfigMap, ConfigValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Chart kinds a schema may declare in `type`.
pub const SUPPORTED_CHART_TYPES: &[&str] = &[
    "line",
    "bar",
    "pie",
    "doughnut",
    "radar",
    "polarArea",
    "bubble",
    "scatter",
];

/// A single validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

// ============================================================================
// SCHEMA VALIDATION
// ============================================================================

/// Check `type`, `source` and `map` of a (usually resolved) schema.
pub fn validate_schema(schema: &ConfigMap) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    match schema.get(keys::TYPE) {
        None => {}
        Some(ConfigValue::String(kind)) if SUPPORTED_CHART_TYPES.contains(&kind.as_str()) => {}
        Some(ConfigValue::String(kind)) => issues.push(ValidationIssue::new(
            keys::TYPE,
            format!(
                "Unsupported chart type '{}' (expected one of: {})",
                kind,
                SUPPORTED_CHART_TYPES.join(", ")
            ),
        )),
        Some(other) => issues.push(ValidationIssue::new(
            keys::TYPE,
            format!("Chart type must be a string, got {}", other.type_name()),
        )),
    }

    if let Some(source) = schema.get(keys::SOURCE) {
        validate_source(source, &mut issues);
    }

    if let Some(map) = schema.get(keys::MAP) {
        validate_field_map(map, keys::MAP, &mut issues);
    }

    issues
}

fn validate_source(source: &ConfigValue, issues: &mut Vec<ValidationIssue>) {
    match source {
        ConfigValue::Object(fields) => {
            let kind = fields.get("type").and_then(ConfigValue::as_str);
            let has_text = |key: &str| {
                fields
                    .get(key)
                    .and_then(ConfigValue::as_str)
                    .is_some_and(|s| !s.trim().is_empty())
            };
            match kind {
                Some("rest" | "request" | "stream" | "websocket") => {
                    if !has_text("url") {
                        issues.push(ValidationIssue::new("source.url", "Source requires a URL"));
                    }
                }
                Some("graphql" | "query") => {
                    if !has_text("url") {
                        issues.push(ValidationIssue::new("source.url", "Source requires a URL"));
                    }
                    if !has_text("query") {
                        issues.push(ValidationIssue::new(
                            "source.query",
                            "Query source requires non-empty query text",
                        ));
                    }
                }
                Some(other) => issues.push(ValidationIssue::new(
                    "source.type",
                    format!("Unknown source type '{}'", other),
                )),
                None => issues.push(ValidationIssue::new(
                    "source.type",
                    "Structured source requires a type",
                )),
            }
        }
        ConfigValue::Call(call) => {
            let url_ok = call.str_arg(0).is_some_and(|s| !s.trim().is_empty());
            match call.name.as_str() {
                "rest" | "request" | "stream" | "websocket" => {
                    if !url_ok {
                        issues.push(ValidationIssue::new(
                            keys::SOURCE,
                            format!("{}() requires a URL argument", call.name),
                        ));
                    }
                }
                "graphql" | "query" => {
                    if !url_ok {
                        issues.push(ValidationIssue::new(
                            keys::SOURCE,
                            format!("{}() requires a URL argument", call.name),
                        ));
                    }
                    if !call.str_arg(1).is_some_and(|s| !s.trim().is_empty()) {
                        issues.push(ValidationIssue::new(
                            keys::SOURCE,
                            format!("{}() requires non-empty query text", call.name),
                        ));
                    }
                }
                other => issues.push(ValidationIssue::new(
                    keys::SOURCE,
                    format!("Unknown source function '{}'", other),
                )),
            }
        }
        ConfigValue::String(url) if !url.trim().is_empty() => {}
        other => issues.push(ValidationIssue::new(
            keys::SOURCE,
            format!("Unsupported source value of type {}", other.type_name()),
        )),
    }
}

fn validate_field_map(value: &ConfigValue, path: &str, issues: &mut Vec<ValidationIssue>) {
    match value {
        ConfigValue::Object(entries) => {
            for (key, entry) in entries {
                validate_field_map(entry, &format!("{}.{}", path, key), issues);
            }
        }
        ConfigValue::String(s) if is_json_path(s) => {}
        ConfigValue::String(s) => issues.push(ValidationIssue::new(
            path,
            format!("Field path '{}' must start with '$.'", s),
        )),
        other => issues.push(ValidationIssue::new(
            path,
            format!("Field path must be a string, got {}", other.type_name()),
        )),
    }
}

// ============================================================================
// RESPONSE VALIDATION
// ============================================================================

/// Check a payload against the canonical `{labels, datasets}` shape.
pub fn validate_response(payload: &Value) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    let Some(obj) = payload.as_object() else {
        issues.push(ValidationIssue::new("$", "Response must be an object"));
        return issues;
    };

    if !obj.get("labels").is_some_and(Value::is_array) {
        issues.push(ValidationIssue::new("labels", "labels must be an array"));
    }

    match obj.get("datasets").and_then(Value::as_array) {
        None => issues.push(ValidationIssue::new("datasets", "datasets must be an array")),
        Some(datasets) => {
            for (i, dataset) in datasets.iter().enumerate() {
                let path = format!("datasets[{}]", i);
                if !dataset.get("label").is_some_and(Value::is_string) {
                    issues.push(ValidationIssue::new(
                        format!("{}.label", path),
                        "Dataset label must be a string",
                    ));
                }
                if !dataset.get("data").is_some_and(Value::is_array) {
                    issues.push(ValidationIssue::new(
                        format!("{}.data", path),
                        "Dataset data must be an array",
                    ));
                }
            }
        }
    }

    issues
}
