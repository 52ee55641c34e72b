//! HTTP transport seam.
//!
//! Adapters talk to the network only through [`HttpTransport`], so tests can
//! swap in a scripted transport. [`ReqwestTransport`] is the real one.

use crate::cancel::CancelSignal;
use async_trait::async_trait;
use chartwell_core::{FetchError, FetchResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// An outbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    /// Query-string parameters, already stringified.
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_json_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A raw response. Status and content type are checked by [`decode_json`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    /// A 200 response carrying `body` as JSON.
    pub fn json(body: &Value) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends requests. Implementations map transport failures to
/// [`FetchError::Network`] and leave status handling to the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> FetchResult<HttpResponse>;
}

// ============================================================================
// REQWEST TRANSPORT
// ============================================================================

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> FetchResult<HttpResponse> {
        let network = |message: String| FetchError::Network {
            url: request.url.clone(),
            message,
        };

        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::invalid_source(format!("invalid method: {}", e)))?;

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| network(e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|e| network(e.to_string()))?;

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}

// ============================================================================
// SHARED HELPERS
// ============================================================================

/// Send once, racing `cancel` against a `timeout`. Whichever fires first
/// aborts the call.
pub async fn send_with_deadline(
    transport: &dyn HttpTransport,
    request: HttpRequest,
    timeout: Duration,
    cancel: &CancelSignal,
) -> FetchResult<HttpResponse> {
    if cancel.is_cancelled() {
        return Err(FetchError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
        outcome = tokio::time::timeout(timeout, transport.send(request)) => match outcome {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                after_ms: timeout.as_millis() as u64,
            }),
        },
    }
}

/// Check status and content type, then parse the body as JSON.
pub fn decode_json(url: &str, response: &HttpResponse) -> FetchResult<Value> {
    if !response.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: response.status,
        });
    }

    let content_type = response.content_type.as_deref().unwrap_or("");
    if !is_json_content_type(content_type) {
        return Err(FetchError::ContentType {
            content_type: content_type.to_string(),
        });
    }

    serde_json::from_str(&response.body).map_err(|e| FetchError::Decode {
        reason: e.to_string(),
    })
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// Stringify query parameters: strings as-is, everything else as JSON.
pub fn query_pairs(params: &BTreeMap<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}
