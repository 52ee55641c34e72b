//! Named schema registry
//!
//! Holds base schemas that other schemas reference with `extends`. Created
//! once by the caller, populated by registration calls and read by every
//! resolution. Nothing expires on its own.

use crate::parser::{parse, ParseError};
use chartwell_core::ConfigMap;
use std::collections::BTreeMap;

/// Registry of named schemas.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: BTreeMap<String, ConfigMap>,
}

impl SchemaRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema under `name`.
    /// Replaces (with a warning) any schema already registered under that name.
    pub fn register(&mut self, name: impl Into<String>, schema: ConfigMap) {
        let name = name.into();
        if self.schemas.contains_key(&name) {
            tracing::warn!(schema = %name, "Overwriting registered schema");
        }
        self.schemas.insert(name, schema);
    }

    /// Parse `source` and register the resulting config under `name`.
    ///
    /// The best-effort config is registered even when parsing reported
    /// errors; the errors are returned to the caller.
    pub fn register_dsl(&mut self, name: impl Into<String>, source: &str) -> Vec<ParseError> {
        let result = parse(source);
        self.register(name, result.config);
        result.errors
    }

    pub fn get(&self, name: &str) -> Option<&ConfigMap> {
        self.schemas.get(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    /// Remove a schema, returning it if it was registered.
    pub fn unregister(&mut self, name: &str) -> Option<ConfigMap> {
        self.schemas.remove(name)
    }

    /// Copy of every registered schema.
    pub fn get_all(&self) -> BTreeMap<String, ConfigMap> {
        self.schemas.clone()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.schemas.keys().map(String::as_str)
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}
