//! Data source descriptors.
//!
//! Exactly one shape is active at a time; adapters dispatch on the tag.

use crate::error::FetchError;
use crate::value::{ConfigValue, FunctionCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Plain request/response source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, alias = "queryParams", skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl RequestSource {
    /// A bare GET of `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: None,
            headers: BTreeMap::new(),
            body: None,
            params: BTreeMap::new(),
        }
    }

    /// HTTP method, defaulting to GET.
    pub fn method(&self) -> String {
        self.method
            .as_deref()
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| "GET".to_string())
    }
}

/// Query/response source (single POST of `{query, variables}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySource {
    pub url: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
}

/// Simulated push source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSource {
    pub url: String,
    #[serde(default, alias = "interval", skip_serializing_if = "Option::is_none")]
    pub refresh_interval_ms: Option<u64>,
}

/// Tag of a [`DataSourceDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Rest,
    Graphql,
    Stream,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Rest => "rest",
            SourceKind::Graphql => "graphql",
            SourceKind::Stream => "stream",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a chart's data comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DataSourceDescriptor {
    #[serde(alias = "request")]
    Rest(RequestSource),
    #[serde(alias = "query")]
    Graphql(QuerySource),
    #[serde(alias = "websocket")]
    Stream(StreamSource),
}

impl DataSourceDescriptor {
    pub fn kind(&self) -> SourceKind {
        match self {
            DataSourceDescriptor::Rest(_) => SourceKind::Rest,
            DataSourceDescriptor::Graphql(_) => SourceKind::Graphql,
            DataSourceDescriptor::Stream(_) => SourceKind::Stream,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            DataSourceDescriptor::Rest(s) => &s.url,
            DataSourceDescriptor::Graphql(s) => &s.url,
            DataSourceDescriptor::Stream(s) => &s.url,
        }
    }

    /// Describes which kind of descriptor this is and which optional fields
    /// are populated, ignoring their values. Two descriptors with the same
    /// signature have the same shape.
    pub fn shape_signature(&self) -> String {
        let mut fields: Vec<&str> = Vec::new();
        match self {
            DataSourceDescriptor::Rest(s) => {
                if s.method.is_some() {
                    fields.push("method");
                }
                if !s.headers.is_empty() {
                    fields.push("headers");
                }
                if s.body.is_some() {
                    fields.push("body");
                }
                if !s.params.is_empty() {
                    fields.push("params");
                }
            }
            DataSourceDescriptor::Graphql(s) => {
                if !s.variables.is_empty() {
                    fields.push("variables");
                }
                if !s.headers.is_empty() {
                    fields.push("headers");
                }
            }
            DataSourceDescriptor::Stream(s) => {
                if s.refresh_interval_ms.is_some() {
                    fields.push("refreshIntervalMs");
                }
            }
        }
        format!("{}({})", self.kind(), fields.join(","))
    }

    /// Interpret a resolved `source` value.
    ///
    /// - a string is a GET of that URL
    /// - `rest(url[, method])`, `graphql(url, query)`, `stream(url[, interval_ms])`
    /// - an object tagged by its `type` key
    pub fn from_config(value: &ConfigValue) -> Result<Self, FetchError> {
        match value {
            ConfigValue::String(url) if !url.trim().is_empty() => {
                Ok(DataSourceDescriptor::Rest(RequestSource::get(url.clone())))
            }
            ConfigValue::Call(call) => Self::from_call(call),
            ConfigValue::Object(_) => serde_json::from_value(value.to_json())
                .map_err(|e| FetchError::invalid_source(e.to_string())),
            other => Err(FetchError::invalid_source(format!(
                "unsupported source value of type {}",
                other.type_name()
            ))),
        }
    }

    fn from_call(call: &FunctionCall) -> Result<Self, FetchError> {
        let url = call
            .str_arg(0)
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| {
                FetchError::invalid_source(format!("{}() requires a URL argument", call.name))
            })?
            .to_string();

        match call.name.as_str() {
            "rest" | "request" => {
                let mut source = RequestSource::get(url);
                source.method = call.str_arg(1).map(str::to_string);
                Ok(DataSourceDescriptor::Rest(source))
            }
            "graphql" | "query" => {
                let query = call.str_arg(1).ok_or_else(|| {
                    FetchError::invalid_source(format!("{}() requires a query argument", call.name))
                })?;
                Ok(DataSourceDescriptor::Graphql(QuerySource {
                    url,
                    query: query.to_string(),
                    variables: Map::new(),
                    headers: BTreeMap::new(),
                }))
            }
            "stream" | "websocket" => Ok(DataSourceDescriptor::Stream(StreamSource {
                url,
                refresh_interval_ms: call
                    .number_arg(1)
                    .filter(|ms| *ms > 0.0)
                    .map(|ms| ms as u64),
            })),
            other => Err(FetchError::invalid_source(format!(
                "unknown source function '{}'",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{insert_path, ConfigMap};

    #[test]
    fn test_plain_string_is_get_request() {
        let descriptor =
            DataSourceDescriptor::from_config(&ConfigValue::from("https://api.test/sales")).unwrap();
        match descriptor {
            DataSourceDescriptor::Rest(source) => {
                assert_eq!(source.url, "https://api.test/sales");
                assert_eq!(source.method(), "GET");
            }
            other => panic!("expected rest source, got {:?}", other),
        }
    }

    #[test]
    fn test_graphql_call() {
        let call = ConfigValue::Call(FunctionCall::new(
            "graphql",
            vec!["https://api.test/graphql".into(), "{ sales { month } }".into()],
        ));
        let descriptor = DataSourceDescriptor::from_config(&call).unwrap();
        assert_eq!(descriptor.kind(), SourceKind::Graphql);
        assert_eq!(descriptor.url(), "https://api.test/graphql");
    }

    #[test]
    fn test_stream_call_interval() {
        let call = ConfigValue::Call(FunctionCall::new(
            "websocket",
            vec!["wss://feed.test".into(), ConfigValue::Number(2000.0)],
        ));
        let descriptor = DataSourceDescriptor::from_config(&call).unwrap();
        assert_eq!(
            descriptor,
            DataSourceDescriptor::Stream(StreamSource {
                url: "wss://feed.test".to_string(),
                refresh_interval_ms: Some(2000),
            })
        );
    }

    #[test]
    fn test_structured_object_with_alias_tag() {
        let mut map = ConfigMap::new();
        insert_path(&mut map, &["type"], "query".into());
        insert_path(&mut map, &["url"], "https://api.test/graphql".into());
        insert_path(&mut map, &["query"], "{ a }".into());
        let descriptor = DataSourceDescriptor::from_config(&ConfigValue::Object(map)).unwrap();
        assert_eq!(descriptor.kind(), SourceKind::Graphql);
    }

    #[test]
    fn test_unknown_call_is_invalid() {
        let call = ConfigValue::Call(FunctionCall::new("ftp", vec!["ftp://x".into()]));
        assert!(matches!(
            DataSourceDescriptor::from_config(&call),
            Err(FetchError::InvalidSource { .. })
        ));
    }

    #[test]
    fn test_shape_signature_tracks_present_fields() {
        let plain = DataSourceDescriptor::Rest(RequestSource::get("https://a"));
        let mut with_method = RequestSource::get("https://a");
        with_method.method = Some("GET".to_string());
        let with_method = DataSourceDescriptor::Rest(with_method);

        assert_eq!(plain.shape_signature(), "rest()");
        assert_eq!(with_method.shape_signature(), "rest(method)");
        assert_ne!(plain.shape_signature(), with_method.shape_signature());
    }
}
