//! CHARTWELL Test Utilities
//!
//! Shared test infrastructure for the Chartwell workspace:
//! - A scripted mock HTTP transport
//! - Fixtures for a typical sales chart
//! - Proptest generators for DSL statements and payloads
//! - Assertions for fetch results and canonical responses

pub use chartwell_core::{
    ChartResponse, ChartwellConfig, ConfigMap, ConfigValue, DataSourceDescriptor, Dataset,
    FetchError, FetchResult, FieldMap, QuerySource, RequestSource, RetryConfig, StreamSource,
    VariableSet,
};
pub use chartwell_sources::{HttpRequest, HttpResponse, HttpTransport};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

// ============================================================================
// MOCK TRANSPORT
// ============================================================================

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    Respond(HttpResponse),
    Fail(FetchError),
    /// Never completes. Only a timeout or cancellation ends the call.
    Hang,
}

impl MockReply {
    pub fn json(body: Value) -> Self {
        MockReply::Respond(HttpResponse::json(&body))
    }

    pub fn status(status: u16) -> Self {
        MockReply::Respond(HttpResponse {
            status,
            content_type: Some("application/json".to_string()),
            body: "{}".to_string(),
        })
    }

    /// A JSON body under any status.
    pub fn json_status(status: u16, body: Value) -> Self {
        MockReply::Respond(HttpResponse {
            status,
            ..HttpResponse::json(&body)
        })
    }

    pub fn html(body: &str) -> Self {
        MockReply::Respond(HttpResponse {
            status: 200,
            content_type: Some("text/html".to_string()),
            body: body.to_string(),
        })
    }

    pub fn network_error(message: &str) -> Self {
        MockReply::Fail(FetchError::Network {
            url: "mock://transport".to_string(),
            message: message.to_string(),
        })
    }
}

/// [`HttpTransport`] that replays scripted replies.
///
/// Each call pops the next scripted reply; once the script runs dry every
/// call gets the fallback. Calls and requests are recorded.
#[derive(Debug)]
pub struct MockTransport {
    script: Mutex<VecDeque<MockReply>>,
    fallback: MockReply,
    delay: Option<Duration>,
    requests: Mutex<Vec<HttpRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new(fallback: MockReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            delay: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answers 200 with `body`.
    pub fn json(body: Value) -> Self {
        Self::new(MockReply::json(body))
    }

    /// Always fails with `error`.
    pub fn failing(error: FetchError) -> Self {
        Self::new(MockReply::Fail(error))
    }

    /// Never answers.
    pub fn hanging() -> Self {
        Self::new(MockReply::Hang)
    }

    pub fn with_script(self, replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..self
        }
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, reply: MockReply) {
        lock(&self.script).push_back(reply);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        lock(&self.requests).last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> FetchResult<HttpResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.requests).push(request);
        let reply = lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Respond(response) => Ok(response),
            MockReply::Fail(error) => Err(error),
            MockReply::Hang => std::future::pending().await,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Canned inputs shared across test suites.

    use super::*;
    use chartwell_dsl::SchemaRegistry;

    pub const SALES_URL: &str = "https://api.test/sales";

    /// A bar chart over [`sales_payload`] with a field map.
    pub const SALES_DSL: &str = r#"
# Monthly sales
type: bar;
source: rest("https://api.test/sales");
map.labels: $.months;
map.datasets: $.charts;
options.plugins.title.text: "Sales";
options.color: $primary;
"#;

    /// A base schema registered as `bar-base` by [`base_registry`].
    pub const BAR_BASE_DSL: &str = r#"
type: bar;
options.responsive: true;
options.scales.y.beginAtZero: true;
options.plugins.legend.position: "top";
"#;

    /// Payload whose shape differs from the canonical response.
    pub fn sales_payload() -> Value {
        json!({
            "months": ["Jan", "Feb", "Mar"],
            "charts": [
                {"label": "Sales", "data": [100, 200, 150]},
                {"label": "Returns", "data": [5, 8, 3]}
            ]
        })
    }

    /// Field map for [`sales_payload`].
    pub fn sales_field_map() -> FieldMap {
        let mut table = FieldMap::new();
        table.insert("labels".to_string(), "$.months".to_string());
        table.insert("datasets".to_string(), "$.charts".to_string());
        table
    }

    /// A payload already in canonical shape.
    pub fn canonical_payload() -> Value {
        json!({
            "labels": ["Q1", "Q2"],
            "datasets": [{"label": "Revenue", "data": [10, 20]}]
        })
    }

    pub fn sales_request() -> DataSourceDescriptor {
        DataSourceDescriptor::Rest(RequestSource::get(SALES_URL))
    }

    pub fn sales_query() -> DataSourceDescriptor {
        DataSourceDescriptor::Graphql(QuerySource {
            url: "https://api.test/graphql".to_string(),
            query: "query { sales { months charts { label data } } }".to_string(),
            variables: Default::default(),
            headers: Default::default(),
        })
    }

    pub fn live_stream() -> DataSourceDescriptor {
        DataSourceDescriptor::Stream(StreamSource {
            url: "wss://api.test/live".to_string(),
            refresh_interval_ms: Some(1_000),
        })
    }

    /// Registry holding `bar-base`.
    pub fn base_registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        let errors = registry.register_dsl("bar-base", BAR_BASE_DSL);
        debug_assert!(errors.is_empty(), "fixture must parse: {:?}", errors);
        registry
    }

    /// Config with fast retries and no jitter, for deterministic tests.
    pub fn fast_config() -> ChartwellConfig {
        let mut config = ChartwellConfig::default().with_retry(RetryConfig {
            max_retries: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
            multiplier: 2.0,
        });
        config.stream.jitter_pct = 0.0;
        config
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for DSL text and payloads.

    use super::*;
    use proptest::prelude::*;

    /// An identifier that is not a boolean keyword.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z][a-zA-Z0-9_]{0,8}".prop_filter("keywords are booleans", |s| {
            s != "true" && s != "false"
        })
    }

    /// A dotted property path of one to four segments.
    pub fn arb_property_path() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_identifier(), 1..=4)
    }

    /// A literal value as DSL text and the config value it parses to.
    pub fn arb_literal() -> impl Strategy<Value = (String, ConfigValue)> {
        prop_oneof![
            "[a-zA-Z0-9 ]{0,12}"
                .prop_map(|s| (format!("\"{}\"", s), ConfigValue::String(s))),
            (0u32..100_000).prop_map(|n| (n.to_string(), ConfigValue::Number(f64::from(n)))),
            any::<bool>().prop_map(|b| (b.to_string(), ConfigValue::Bool(b))),
        ]
    }

    /// One `path: value;` statement with its path and expected value.
    pub fn arb_statement() -> impl Strategy<Value = (String, Vec<String>, ConfigValue)> {
        (arb_property_path(), arb_literal()).prop_map(|(path, (text, value))| {
            (format!("{}: {};", path.join("."), text), path, value)
        })
    }

    /// A JSON path rooted at `$`.
    pub fn arb_json_path() -> impl Strategy<Value = String> {
        prop::collection::vec(arb_identifier(), 1..=3)
            .prop_map(|segments| format!("$.{}", segments.join(".")))
    }

    /// Arbitrary JSON up to a small depth.
    pub fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1_000i64..1_000).prop_map(Value::from),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// A field map of one to three entries.
    pub fn arb_field_map() -> impl Strategy<Value = FieldMap> {
        prop::collection::btree_map(arb_identifier(), arb_json_path(), 1..=3)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions with readable failure messages.

    use super::*;

    pub fn assert_cancelled<T: std::fmt::Debug>(result: &FetchResult<T>) {
        assert!(
            matches!(result, Err(FetchError::Cancelled)),
            "expected cancellation, got {:?}",
            result
        );
    }

    pub fn assert_timeout<T: std::fmt::Debug>(result: &FetchResult<T>) {
        assert!(
            matches!(result, Err(FetchError::Timeout { .. })),
            "expected timeout, got {:?}",
            result
        );
    }

    pub fn assert_status<T: std::fmt::Debug>(result: &FetchResult<T>, expected: u16) {
        match result {
            Err(FetchError::Status { status, .. }) => assert_eq!(*status, expected),
            other => panic!("expected status {}, got {:?}", expected, other),
        }
    }

    /// The response passes the canonical-shape checks.
    pub fn assert_canonical(response: &ChartResponse) {
        let issues = chartwell_dsl::validate_response(&response.to_json());
        assert!(issues.is_empty(), "response not canonical: {:?}", issues);
    }

    pub fn assert_labels(response: &ChartResponse, labels: &[&str]) {
        let actual: Vec<&str> = response.labels.iter().map(String::as_str).collect();
        assert_eq!(actual, labels);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = MockTransport::json(json!({"ok": true}))
            .with_script([MockReply::status(500), MockReply::network_error("reset")]);

        let r1 = transport.send(HttpRequest::new("GET", "https://a")).await.unwrap();
        assert_eq!(r1.status, 500);
        let r2 = transport.send(HttpRequest::new("GET", "https://a")).await;
        assert!(matches!(r2, Err(FetchError::Network { .. })));
        let r3 = transport.send(HttpRequest::new("GET", "https://b")).await.unwrap();
        assert_eq!(r3.status, 200);

        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.last_request().unwrap().url, "https://b");
    }

    #[tokio::test(start_paused = true)]
    async fn test_hang_never_completes() {
        let transport = Arc::new(MockTransport::hanging());
        let outcome = tokio::time::timeout(
            Duration::from_secs(60),
            transport.send(HttpRequest::new("GET", "https://a")),
        )
        .await;
        assert!(outcome.is_err());
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_fixtures_parse() {
        let parsed = chartwell_dsl::parse(fixtures::SALES_DSL);
        assert!(parsed.is_ok(), "{:?}", parsed.errors);
        assert_eq!(parsed.metadata.map, Some(fixtures::sales_field_map()));
        assert!(fixtures::base_registry().has("bar-base"));
    }
}
