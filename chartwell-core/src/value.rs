//! Schema property values.
//!
//! A schema is an open-ended string-keyed map. Besides JSON-like scalars and
//! containers, a value can be a not-yet-evaluated function call literal (from
//! `source: rest("...")`) or a deferred callback compiled from an `${...}`
//! interpolation and evaluated against late-bound props.

use crate::error::EvalError;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Nested property map. Ordered so that printing and fingerprinting are
/// deterministic.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Flat target-path -> source-path table (the `map` block of a schema).
pub type FieldMap = BTreeMap<String, String>;

/// Prefix marking a data-extraction path (`$.labels`).
pub const JSON_PATH_ROOT: &str = "$.";

/// Sigil marking a theme variable reference (`$primary`).
pub const VARIABLE_SIGIL: char = '$';

/// Returns true if `text` is a data-extraction path.
///
/// Only a `$` immediately followed by `.` qualifies.
pub fn is_json_path(text: &str) -> bool {
    text.starts_with(JSON_PATH_ROOT)
}

/// Returns true if `text` should be looked up in the variable set.
pub fn is_variable_reference(text: &str) -> bool {
    text.len() > 1 && text.starts_with(VARIABLE_SIGIL) && !is_json_path(text)
}

/// Signature of a compiled interpolation.
pub type CallbackFn = dyn Fn(&Value) -> Result<Value, EvalError> + Send + Sync;

/// A compiled single-argument callback plus the expression it came from.
#[derive(Clone)]
pub struct Callback {
    expression: String,
    func: Arc<CallbackFn>,
}

impl Callback {
    pub fn new<F>(expression: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            expression: expression.into(),
            func: Arc::new(func),
        }
    }

    /// The raw expression text between `${` and `}`.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Invoke the callback with the caller's props.
    pub fn invoke(&self, props: &Value) -> Result<Value, EvalError> {
        (self.func)(props)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback(${{{}}})", self.expression)
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.expression == other.expression
    }
}

/// A deferred built-in call such as `rest("https://...")`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Vec<ConfigValue>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<ConfigValue>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    /// Positional string argument, if present and a string.
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(ConfigValue::as_str)
    }

    /// Positional numeric argument, if present and a number.
    pub fn number_arg(&self, index: usize) -> Option<f64> {
        self.args.get(index).and_then(ConfigValue::as_f64)
    }
}

/// A single schema property value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(ConfigMap),
    /// Function-call literal left for a later stage to interpret.
    Call(FunctionCall),
    /// Interpolation evaluated when props are supplied.
    Deferred(Callback),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "boolean",
            ConfigValue::Number(_) => "number",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Object(_) => "object",
            ConfigValue::Call(_) => "call",
            ConfigValue::Deferred(_) => "callback",
        }
    }

    /// Convert into plain JSON.
    ///
    /// Calls become `{"$call": name, "args": [...]}` and deferred callbacks
    /// their `${expr}` source text.
    pub fn to_json(&self) -> Value {
        match self {
            ConfigValue::Null => Value::Null,
            ConfigValue::Bool(b) => Value::Bool(*b),
            ConfigValue::Number(n) => number_to_json(*n),
            ConfigValue::String(s) => Value::String(s.clone()),
            ConfigValue::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ConfigValue::Object(map) => Value::Object(map_to_json(map)),
            ConfigValue::Call(call) => {
                let mut obj = Map::new();
                obj.insert("$call".to_string(), Value::String(call.name.clone()));
                obj.insert(
                    "args".to_string(),
                    Value::Array(call.args.iter().map(Self::to_json).collect()),
                );
                Value::Object(obj)
            }
            ConfigValue::Deferred(cb) => Value::String(format!("${{{}}}", cb.expression())),
        }
    }

    /// Build from plain JSON. The inverse of [`ConfigValue::to_json`] for
    /// everything except callbacks, which come back as strings.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ConfigValue::Null,
            Value::Bool(b) => ConfigValue::Bool(*b),
            Value::Number(n) => n.as_f64().map(ConfigValue::Number).unwrap_or_default(),
            Value::String(s) => ConfigValue::String(s.clone()),
            Value::Array(items) => ConfigValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(obj) => {
                if let (Some(Value::String(name)), Some(Value::Array(args)), 2) =
                    (obj.get("$call"), obj.get("args"), obj.len())
                {
                    return ConfigValue::Call(FunctionCall::new(
                        name.clone(),
                        args.iter().map(Self::from_json).collect(),
                    ));
                }
                ConfigValue::Object(
                    obj.iter()
                        .map(|(k, v)| (k.clone(), Self::from_json(v)))
                        .collect(),
                )
            }
        }
    }
}

/// Integral values become JSON integers.
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

/// Convert a whole property map into a JSON object.
pub fn map_to_json(map: &ConfigMap) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        ConfigValue::Object(value)
    }
}

impl From<&Value> for ConfigValue {
    fn from(value: &Value) -> Self {
        ConfigValue::from_json(value)
    }
}

/// Write `value` at `path` inside `map`, creating intermediate objects.
///
/// A non-object found on the way is replaced by an object (later wins).
pub fn insert_path<S: AsRef<str>>(map: &mut ConfigMap, path: &[S], value: ConfigValue) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = map;
    for segment in parents {
        let entry = current
            .entry(segment.as_ref().to_string())
            .or_insert_with(|| ConfigValue::Object(ConfigMap::new()));
        if !entry.is_object() {
            *entry = ConfigValue::Object(ConfigMap::new());
        }
        current = match entry {
            ConfigValue::Object(inner) => inner,
            _ => return,
        };
    }
    current.insert(last.as_ref().to_string(), value);
}

/// Read the value at a dotted path (`options.scales.y`).
pub fn lookup_path<'a>(map: &'a ConfigMap, dotted: &str) -> Option<&'a ConfigValue> {
    let mut segments = dotted.split('.');
    let first = segments.next()?;
    let mut current = map.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_path_marker_disambiguation() {
        assert!(is_json_path("$.months"));
        assert!(!is_json_path("$primary"));
        assert!(is_variable_reference("$primary"));
        assert!(!is_variable_reference("$.months"));
        assert!(!is_variable_reference("$"));
        assert!(!is_variable_reference("primary"));
    }

    #[test]
    fn test_insert_path_builds_intermediates() {
        let mut map = ConfigMap::new();
        insert_path(&mut map, &["options", "scales", "y"], ConfigValue::Bool(true));
        assert_eq!(
            lookup_path(&map, "options.scales.y"),
            Some(&ConfigValue::Bool(true))
        );
    }

    #[test]
    fn test_insert_path_replaces_scalar_parent() {
        let mut map = ConfigMap::new();
        insert_path(&mut map, &["options"], ConfigValue::from("flat"));
        insert_path(&mut map, &["options", "responsive"], ConfigValue::Bool(false));
        assert_eq!(
            lookup_path(&map, "options.responsive"),
            Some(&ConfigValue::Bool(false))
        );
    }

    #[test]
    fn test_json_conversion_keeps_integers_integral() {
        let value = ConfigValue::Array(vec![ConfigValue::Number(100.0), ConfigValue::Number(1.5)]);
        assert_eq!(value.to_json(), json!([100, 1.5]));
    }

    #[test]
    fn test_call_round_trips_through_json() {
        let call = ConfigValue::Call(FunctionCall::new(
            "graphql",
            vec!["https://api.test/graphql".into(), "{ sales }".into()],
        ));
        let json = call.to_json();
        assert_eq!(json["$call"], "graphql");
        assert_eq!(ConfigValue::from_json(&json), call);
    }

    #[test]
    fn test_callback_equality_uses_expression() {
        let a = Callback::new("params.title", |_| Ok(Value::Null));
        let b = Callback::new("params.title", |_| Ok(Value::Bool(true)));
        assert_eq!(a, b);
        assert_eq!(
            ConfigValue::Deferred(a).to_json(),
            Value::String("${params.title}".to_string())
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(Value::from),
            "[a-z $.]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_plain_json_survives_conversion(json in arb_json()) {
            prop_assert_eq!(ConfigValue::from_json(&json).to_json(), json);
        }

        #[test]
        fn prop_insert_then_lookup(
            path in prop::collection::vec("[a-z]{1,6}", 1..5),
            text in "[a-z]{0,8}",
        ) {
            let mut map = ConfigMap::new();
            insert_path(&mut map, &["noise"], ConfigValue::Bool(true));
            insert_path(&mut map, &path, ConfigValue::from(text.as_str()));
            prop_assert_eq!(
                lookup_path(&map, &path.join(".")),
                Some(&ConfigValue::String(text))
            );
        }
    }
}
