//! Query/response adapter: one POST of `{query, variables}` per fetch.

use crate::transport::{decode_json, send_with_deadline, HttpRequest, HttpResponse, HttpTransport};
use crate::{apply_field_map, DataSourceAdapter, FetchContext};
use async_trait::async_trait;
use chartwell_core::{
    DataSourceDescriptor, FetchError, FetchResult, QuerySource, SourceKind,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

/// Fetches [`QuerySource`]s. No retry and no cache.
pub struct QueryAdapter {
    transport: Arc<dyn HttpTransport>,
    timeout: Duration,
}

impl QueryAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The JSON body sent for `source`. Props override declared variables.
    pub fn request_body(source: &QuerySource, props: Option<&Value>) -> Value {
        let mut variables: Map<String, Value> = source.variables.clone();
        if let Some(props) = props.and_then(Value::as_object) {
            for (k, v) in props {
                variables.insert(k.clone(), v.clone());
            }
        }
        json!({
            "query": source.query,
            "variables": variables,
        })
    }
}

impl std::fmt::Debug for QueryAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryAdapter")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl DataSourceAdapter for QueryAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Graphql
    }

    async fn fetch_json(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<Value> {
        let DataSourceDescriptor::Graphql(source) = descriptor else {
            return Err(FetchError::invalid_source(format!(
                "query adapter cannot fetch a {} source",
                descriptor.kind()
            )));
        };

        let request = HttpRequest::new("POST", source.url.clone())
            .with_header("Content-Type", "application/json")
            .with_headers(source.headers.clone())
            .with_json_body(Self::request_body(source, ctx.props.as_ref()));

        let response =
            send_with_deadline(self.transport.as_ref(), request, self.timeout, &ctx.cancel).await?;
        let body = match decode_json(&source.url, &response) {
            Ok(body) => body,
            Err(status @ FetchError::Status { .. }) => {
                return Err(error_list(&response).unwrap_or(status));
            }
            Err(e) => return Err(e),
        };
        let payload = unwrap_query_response(body)?;
        Ok(apply_field_map(payload, ctx.field_map.as_ref()))
    }
}

/// The `errors` list of a failed response whose body is still JSON.
fn error_list(response: &HttpResponse) -> Option<FetchError> {
    let body: Value = serde_json::from_str(&response.body).ok()?;
    unwrap_query_response(body).err()
}

/// Fail on a non-empty `errors` list, otherwise unwrap a `data` object.
pub fn unwrap_query_response(body: Value) -> FetchResult<Value> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages = errors
                .iter()
                .map(|e| match e.get("message").and_then(Value::as_str) {
                    Some(message) => message.to_string(),
                    None => e.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            return Err(FetchError::Query { messages });
        }
    }

    match body {
        Value::Object(mut obj) if obj.get("data").is_some_and(Value::is_object) => {
            Ok(obj.remove("data").unwrap_or(Value::Null))
        }
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_list_read_from_failed_response() {
        let response = HttpResponse {
            status: 400,
            content_type: Some("application/json".to_string()),
            body: json!({"errors": [{"message": "Syntax error"}]}).to_string(),
        };
        assert!(matches!(
            error_list(&response),
            Some(FetchError::Query { ref messages }) if messages == "Syntax error"
        ));

        let html = HttpResponse {
            status: 500,
            content_type: Some("text/html".to_string()),
            body: "<h1>oops</h1>".to_string(),
        };
        assert!(error_list(&html).is_none());
    }

    #[test]
    fn test_request_body_merges_props() {
        let mut variables = Map::new();
        variables.insert("year".to_string(), json!(2023));
        variables.insert("region".to_string(), json!("emea"));
        let source = QuerySource {
            url: "https://api.test/graphql".to_string(),
            query: "query Sales($year: Int) { sales(year: $year) { months } }".to_string(),
            variables,
            headers: Default::default(),
        };
        let body = QueryAdapter::request_body(&source, Some(&json!({"year": 2024})));
        assert_eq!(body["query"], json!(source.query));
        assert_eq!(body["variables"], json!({"year": 2024, "region": "emea"}));
    }

    #[test]
    fn test_errors_fail_with_joined_messages() {
        let body = json!({
            "data": null,
            "errors": [{"message": "Field 'x' missing"}, {"message": "Bad year"}]
        });
        assert_eq!(
            unwrap_query_response(body),
            Err(FetchError::Query {
                messages: "Field 'x' missing, Bad year".to_string()
            })
        );
    }

    #[test]
    fn test_empty_errors_are_ignored_and_data_unwrapped() {
        let body = json!({"errors": [], "data": {"labels": ["a"]}});
        assert_eq!(unwrap_query_response(body), Ok(json!({"labels": ["a"]})));
    }

    #[test]
    fn test_unwrapped_payload_passes_through() {
        let body = json!({"labels": [], "datasets": []});
        assert_eq!(unwrap_query_response(body.clone()), Ok(body));
    }
}
