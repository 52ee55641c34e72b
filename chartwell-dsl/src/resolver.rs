//! Schema Resolver - inheritance, merging and variable substitution
//!
//! ```text
//! schema ──extends──▶ base ──extends──▶ base ...
//!    │                  │
//!    └── deep merge ◀───┘   (child wins, objects merge key by key)
//!            │
//!            ▼
//!   substitute $variables, invoke callbacks, collapse rest(url)
//!            │
//!            ▼
//!     ResolvedConfig { config, dependencies, errors }
//! ```
//!
//! Resolution never fails and never loops: problems are collected as
//! [`ResolutionError`]s next to a best-effort config.

use crate::registry::SchemaRegistry;
use chartwell_core::{is_variable_reference, keys, ConfigMap, ConfigValue, VariableSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Built-in call names that collapse to their single URL argument.
pub const PLAIN_REQUEST_CALLS: &[&str] = &["rest", "request"];

// ============================================================================
// RESOLUTION ERRORS
// ============================================================================

/// Stable resolution error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionErrorCode {
    CircularDependency,
    MissingSchema,
    InvalidProperty,
    VariableNotFound,
}

impl ResolutionErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionErrorCode::CircularDependency => "CIRCULAR_DEPENDENCY",
            ResolutionErrorCode::MissingSchema => "MISSING_SCHEMA",
            ResolutionErrorCode::InvalidProperty => "INVALID_PROPERTY",
            ResolutionErrorCode::VariableNotFound => "VARIABLE_NOT_FOUND",
        }
    }
}

/// A problem found while resolving a schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionError {
    pub code: ResolutionErrorCode,
    pub message: String,
    /// Dotted property path or schema name the error refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl ResolutionError {
    fn new(code: ResolutionErrorCode, message: String, path: Option<String>) -> Self {
        Self {
            code,
            message,
            path,
        }
    }
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.as_str(), self.message)
    }
}

/// Output of a resolution call.
#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub config: ConfigMap,
    /// Base schema names in the order they were visited.
    pub dependencies: Vec<String>,
    pub errors: Vec<ResolutionError>,
}

impl ResolvedConfig {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors_with_code(
        &self,
        code: ResolutionErrorCode,
    ) -> impl Iterator<Item = &ResolutionError> {
        self.errors.iter().filter(move |e| e.code == code)
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

/// Resolves schemas against a registry and variable set.
pub struct SchemaResolver<'a> {
    registry: &'a SchemaRegistry,
    variables: &'a VariableSet,
    props: Option<&'a Value>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry, variables: &'a VariableSet) -> Self {
        Self {
            registry,
            variables,
            props: None,
        }
    }

    /// Props passed to deferred callbacks. Without props, callbacks stay
    /// deferred.
    pub fn with_props(mut self, props: &'a Value) -> Self {
        self.props = Some(props);
        self
    }

    /// Resolve an inline (unnamed) schema.
    pub fn resolve(&self, schema: &ConfigMap) -> ResolvedConfig {
        self.resolve_from(schema, Vec::new())
    }

    /// Resolve a registered schema by name.
    pub fn resolve_named(&self, name: &str) -> ResolvedConfig {
        match self.registry.get(name) {
            Some(schema) => self.resolve_from(schema, vec![name.to_string()]),
            None => ResolvedConfig {
                errors: vec![missing_schema(name)],
                ..Default::default()
            },
        }
    }

    fn resolve_from(&self, schema: &ConfigMap, mut chain: Vec<String>) -> ResolvedConfig {
        let mut resolved = ResolvedConfig::default();
        let mut config = self.merge_chain(schema, &mut chain, &mut resolved);
        self.post_process(&mut config, &mut resolved.errors);
        resolved.config = config;
        resolved
    }

    /// Resolve `extends` recursively and merge `schema` on top of its base.
    fn merge_chain(
        &self,
        schema: &ConfigMap,
        chain: &mut Vec<String>,
        resolved: &mut ResolvedConfig,
    ) -> ConfigMap {
        let mut merged = ConfigMap::new();

        match schema.get(keys::EXTENDS) {
            None => {}
            Some(ConfigValue::String(base_name)) => {
                if chain.iter().any(|n| n == base_name) {
                    let cycle = chain
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(base_name.as_str()))
                        .collect::<Vec<_>>()
                        .join(" -> ");
                    tracing::warn!(cycle = %cycle, "Circular schema inheritance");
                    resolved.errors.push(ResolutionError::new(
                        ResolutionErrorCode::CircularDependency,
                        format!("Circular dependency detected: {}", cycle),
                        Some(base_name.clone()),
                    ));
                } else if let Some(base) = self.registry.get(base_name) {
                    resolved.dependencies.push(base_name.clone());
                    chain.push(base_name.clone());
                    merged = self.merge_chain(base, chain, resolved);
                    chain.pop();
                } else {
                    resolved.errors.push(missing_schema(base_name));
                }
            }
            Some(other) => {
                resolved.errors.push(ResolutionError::new(
                    ResolutionErrorCode::InvalidProperty,
                    format!("'extends' must be a schema name, got {}", other.type_name()),
                    Some(keys::EXTENDS.to_string()),
                ));
            }
        }

        let mut own = schema.clone();
        own.remove(keys::EXTENDS);
        deep_merge(&mut merged, own);
        merged
    }

    /// Substitute variables, evaluate callbacks and collapse source calls.
    fn post_process(&self, config: &mut ConfigMap, errors: &mut Vec<ResolutionError>) {
        for (key, value) in config.iter_mut() {
            if key == keys::MAP {
                continue;
            }
            if key == keys::SOURCE {
                collapse_source_call(value);
            }
            self.substitute(value, key, errors);
        }
    }

    fn substitute(&self, value: &mut ConfigValue, path: &str, errors: &mut Vec<ResolutionError>) {
        match value {
            ConfigValue::String(text) if is_variable_reference(text) => {
                match self.variables.get(text) {
                    Some(replacement) => *value = replacement.clone(),
                    None => errors.push(ResolutionError::new(
                        ResolutionErrorCode::VariableNotFound,
                        format!("Variable '{}' not found", text),
                        Some(path.to_string()),
                    )),
                }
            }
            ConfigValue::Array(items) => {
                for (i, item) in items.iter_mut().enumerate() {
                    self.substitute(item, &format!("{}[{}]", path, i), errors);
                }
            }
            ConfigValue::Object(map) => {
                for (key, item) in map.iter_mut() {
                    self.substitute(item, &format!("{}.{}", path, key), errors);
                }
            }
            ConfigValue::Deferred(callback) => {
                let Some(props) = self.props else {
                    return;
                };
                match callback.invoke(props) {
                    Ok(result) => *value = ConfigValue::from_json(&result),
                    Err(e) => {
                        tracing::debug!(
                            path = %path,
                            expression = %callback.expression(),
                            error = %e,
                            "Callback failed, keeping it deferred"
                        );
                    }
                }
            }
            _ => {}
        }
    }
}

/// Resolve an inline schema.
pub fn resolve(
    schema: &ConfigMap,
    registry: &SchemaRegistry,
    variables: &VariableSet,
    props: Option<&Value>,
) -> ResolvedConfig {
    let resolver = SchemaResolver::new(registry, variables);
    match props {
        Some(props) => resolver.with_props(props).resolve(schema),
        None => resolver.resolve(schema),
    }
}

/// Resolve a registered schema by name.
pub fn resolve_named(
    name: &str,
    registry: &SchemaRegistry,
    variables: &VariableSet,
    props: Option<&Value>,
) -> ResolvedConfig {
    let resolver = SchemaResolver::new(registry, variables);
    match props {
        Some(props) => resolver.with_props(props).resolve_named(name),
        None => resolver.resolve_named(name),
    }
}

fn missing_schema(name: &str) -> ResolutionError {
    ResolutionError::new(
        ResolutionErrorCode::MissingSchema,
        format!("Schema '{}' is not registered", name),
        Some(name.to_string()),
    )
}

/// Merge `overlay` into `base`. Objects merge key by key; everything else,
/// arrays included, is replaced.
pub fn deep_merge(base: &mut ConfigMap, overlay: ConfigMap) {
    for (key, value) in overlay {
        match value {
            ConfigValue::Object(incoming) => match base.get_mut(&key) {
                Some(ConfigValue::Object(existing)) => deep_merge(existing, incoming),
                _ => {
                    base.insert(key, ConfigValue::Object(incoming));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

fn collapse_source_call(value: &mut ConfigValue) {
    let url = match value {
        ConfigValue::Call(call)
            if PLAIN_REQUEST_CALLS.contains(&call.name.as_str()) && call.args.len() == 1 =>
        {
            call.str_arg(0).map(str::to_string)
        }
        _ => None,
    };
    if let Some(url) = url {
        *value = ConfigValue::String(url);
    }
}
