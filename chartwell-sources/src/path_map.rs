//! Path mapper
//!
//! Reads values out of arbitrary nested payloads with `$.a.b[0]` paths and
//! reshapes them through a target → source [`FieldMap`].
//!
//! Paths are rooted at `$`; the root may be omitted (`a.b` reads the same as
//! `$.a.b`). Each segment is a key, optionally followed by one `[n]` index.
//! A bare `[n]` segment indexes the current value directly.

use chartwell_core::{FieldMap, VARIABLE_SIGIL};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment<'a> {
    key: Option<&'a str>,
    index: Option<usize>,
}

/// Split a path into segments. `None` if any segment is malformed.
fn segments(path: &str) -> Option<Vec<Segment<'_>>> {
    let trimmed = path.trim();
    let body = trimmed
        .strip_prefix(VARIABLE_SIGIL)
        .map(|rest| rest.strip_prefix('.').unwrap_or(rest))
        .unwrap_or(trimmed);
    if body.is_empty() {
        return Some(Vec::new());
    }

    body.split('.').map(parse_segment).collect()
}

fn parse_segment(raw: &str) -> Option<Segment<'_>> {
    match raw.find('[') {
        None if raw.is_empty() => None,
        None => Some(Segment {
            key: Some(raw),
            index: None,
        }),
        Some(open) => {
            let inner = raw[open + 1..].strip_suffix(']')?;
            let index = inner.trim().parse::<usize>().ok()?;
            let key = &raw[..open];
            Some(Segment {
                key: (!key.is_empty()).then_some(key),
                index: Some(index),
            })
        }
    }
}

/// Read the value at `path`. `None` when any step is missing.
pub fn get_value<'v>(payload: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = payload;
    for segment in segments(path)? {
        if let Some(key) = segment.key {
            current = current.as_object()?.get(key)?;
        }
        if let Some(index) = segment.index {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

/// Largest array index [`set_value`] will pad up to.
pub const MAX_SET_INDEX: usize = 10_000;

/// Write `value` at `path`, creating objects and padding arrays with nulls
/// as needed. Existing non-container values on the way are replaced.
/// Returns false, leaving `payload` untouched, for a malformed or empty path
/// or one with an index above [`MAX_SET_INDEX`].
pub fn set_value(payload: &mut Value, path: &str, value: Value) -> bool {
    let Some(segments) = segments(path) else {
        return false;
    };
    if segments.is_empty() {
        return false;
    }
    if segments
        .iter()
        .any(|segment| segment.index.is_some_and(|index| index > MAX_SET_INDEX))
    {
        return false;
    }

    let mut current = payload;
    for segment in segments {
        if let Some(key) = segment.key {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            current = match current {
                Value::Object(map) => map.entry(key.to_string()).or_insert(Value::Null),
                _ => return false,
            };
        }
        if let Some(index) = segment.index {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            current = match current {
                Value::Array(items) => {
                    if items.len() <= index {
                        items.resize(index + 1, Value::Null);
                    }
                    &mut items[index]
                }
                _ => return false,
            };
        }
    }

    *current = value;
    true
}

/// Apply a target → source table to `payload`.
///
/// Each extracted value is written at its (possibly dotted) target path in a
/// fresh object. Entries whose source path resolves to nothing are omitted.
pub fn map_payload(payload: &Value, table: &FieldMap) -> Value {
    let mut out = Value::Object(Map::new());
    for (target, source) in table {
        match get_value(payload, source) {
            Some(value) => {
                set_value(&mut out, target, value.clone());
            }
            None => tracing::debug!(field = %target, path = %source, "Mapped field not found"),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sales() -> Value {
        json!({
            "months": ["Jan", "Feb"],
            "charts": [{"label": "Sales", "values": [100, 200]}],
            "meta": {"region": {"name": "EMEA"}}
        })
    }

    #[test]
    fn test_get_value_paths() {
        let payload = sales();
        assert_eq!(get_value(&payload, "$.months[1]"), Some(&json!("Feb")));
        assert_eq!(get_value(&payload, "$.charts[0].values[1]"), Some(&json!(200)));
        assert_eq!(get_value(&payload, "meta.region.name"), Some(&json!("EMEA")));
        assert_eq!(get_value(&payload, "$"), Some(&payload));
    }

    #[test]
    fn test_get_value_missing_is_none() {
        let payload = sales();
        assert_eq!(get_value(&payload, "$.nope.deeper"), None);
        assert_eq!(get_value(&payload, "$.months[5]"), None);
        assert_eq!(get_value(&payload, "$.months.name"), None);
        assert_eq!(get_value(&payload, "$.meta[0]"), None);
        assert_eq!(get_value(&payload, "$.months[x]"), None);
        assert_eq!(get_value(&payload, "$.a..b"), None);
    }

    #[test]
    fn test_bare_index_segment() {
        let payload = json!({"rows": [[1, 2], [3, 4]]});
        assert_eq!(get_value(&payload, "$.rows[1].[0]"), Some(&json!(3)));
    }

    #[test]
    fn test_map_payload_reshapes() {
        let mut table = FieldMap::new();
        table.insert("labels".to_string(), "$.months".to_string());
        table.insert("datasets".to_string(), "$.charts".to_string());

        assert_eq!(
            map_payload(&sales(), &table),
            json!({
                "labels": ["Jan", "Feb"],
                "datasets": [{"label": "Sales", "values": [100, 200]}]
            })
        );
    }

    #[test]
    fn test_map_payload_omits_missing_and_builds_nested_targets() {
        let mut table = FieldMap::new();
        table.insert("meta.title".to_string(), "$.meta.region.name".to_string());
        table.insert("options.missing".to_string(), "$.nothing".to_string());

        assert_eq!(
            map_payload(&sales(), &table),
            json!({"meta": {"title": "EMEA"}})
        );
    }

    #[test]
    fn test_set_value_builds_containers() {
        let mut payload = Value::Null;
        assert!(set_value(&mut payload, "$.series[1].points", json!([1, 2])));
        assert_eq!(
            payload,
            json!({"series": [null, {"points": [1, 2]}]})
        );
        assert!(!set_value(&mut payload, "$", json!(1)));
        assert!(!set_value(&mut payload, "$.a[", json!(1)));
    }

    #[test]
    fn test_set_value_rejects_huge_index() {
        let mut payload = json!({"keep": true});
        assert!(!set_value(&mut payload, "$.ticks[18446744073709551615]", json!(1)));
        assert!(!set_value(&mut payload, "$.ticks[10001]", json!(1)));
        assert_eq!(payload, json!({"keep": true}));

        assert!(set_value(&mut payload, "$.ticks[10000]", json!(1)));
        assert_eq!(payload["ticks"].as_array().map(Vec::len), Some(10_001));
    }

    #[test]
    fn test_set_then_get() {
        let mut payload = json!({"keep": true});
        set_value(&mut payload, "$.data.rows[2]", json!("x"));
        assert_eq!(get_value(&payload, "$.data.rows[2]"), Some(&json!("x")));
        assert_eq!(get_value(&payload, "$.keep"), Some(&json!(true)));
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_segment() -> impl Strategy<Value = String> {
        ("[a-z][a-z0-9_]{0,6}", proptest::option::of(0usize..4)).prop_map(|(key, index)| {
            match index {
                Some(i) => format!("{}[{}]", key, i),
                None => key,
            }
        })
    }

    fn arb_path() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_segment(), 1..5).prop_map(|segs| format!("$.{}", segs.join(".")))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_set_then_get_returns_value(path in arb_path(), n in any::<i64>()) {
            let mut payload = Value::Object(Map::new());
            prop_assert!(set_value(&mut payload, &path, Value::from(n)));
            prop_assert_eq!(get_value(&payload, &path), Some(&Value::from(n)));
        }

        #[test]
        fn prop_get_value_never_panics(path in ".{0,40}") {
            let payload = serde_json::json!({"a": [1, {"b": 2}], "c": "d"});
            let _ = get_value(&payload, &path);
        }
    }
}
