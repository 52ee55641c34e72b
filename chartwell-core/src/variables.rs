//! Theme variable set used for `$name` substitution.

use crate::value::{ConfigValue, VARIABLE_SIGIL};
use std::collections::BTreeMap;

/// Named values substituted for `$name` references during resolution.
///
/// Keys are stored without the sigil; lookups accept either form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableSet {
    values: BTreeMap<String, ConfigValue>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock palette.
    pub fn with_defaults() -> Self {
        let mut set = Self::new();
        set.set("primary", "#3b82f6");
        set.set("secondary", "#8b5cf6");
        set.set("background", "#ffffff");
        set.set("text", "#1f2937");
        set.set("success", "#10b981");
        set.set("error", "#ef4444");
        set.set("warning", "#f59e0b");
        set
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<ConfigValue>) -> &mut Self {
        self.values
            .insert(normalize(name.as_ref()).to_string(), value.into());
        self
    }

    pub fn with(mut self, name: impl AsRef<str>, value: impl Into<ConfigValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(normalize(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(normalize(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<ConfigValue> {
        self.values.remove(normalize(name))
    }

    /// Copy every entry of `other` into this set, overwriting duplicates.
    pub fn extend(&mut self, other: &VariableSet) {
        for (k, v) in &other.values {
            self.values.insert(k.clone(), v.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn normalize(name: &str) -> &str {
    name.strip_prefix(VARIABLE_SIGIL).unwrap_or(name)
}
