//! CHARTWELL Sources - Data Source Adapters
//!
//! One fetch contract, three implementations:
//!
//! ```text
//! DataSourceDescriptor ──▶ SourceAdapters::fetch ──▶ ShapeTracker::observe
//!                               │
//!                               ▼
//!                     SourceAdapters::adapter_for(tag)
//!                               │
//!        ┌──────────────────────┼──────────────────────┐
//!        ▼                      ▼                      ▼
//!  RequestAdapter          QueryAdapter           StreamAdapter
//!  (cache, retry,          (single POST,          (baseline ± jitter,
//!   timeout, cancel)        error channel)         no network)
//!        │                      │                      │
//!        └──────────── path mapping (FieldMap) ────────┘
//!                               ▼
//!                   mapped JSON (fetch_json) ──▶ ChartResponse (fetch)
//! ```
//!
//! The cache-bust counter lives in a [`ShapeTracker`] carried by the
//! [`FetchContext`], so each caller scope tracks its own source shape.

pub mod cancel;
pub mod path_map;
pub mod query;
pub mod request;
pub mod shape;
pub mod stream;
pub mod transport;

pub use cancel::{CancelHandle, CancelSignal};
pub use path_map::{get_value, map_payload, set_value};
pub use query::QueryAdapter;
pub use request::{substitute_placeholders, RequestAdapter};
pub use shape::ShapeTracker;
pub use stream::{Baseline, StreamAdapter};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

use async_trait::async_trait;
use chartwell_core::{
    ChartResponse, ChartwellConfig, DataSourceDescriptor, FetchResult, FieldMap, SourceKind,
};
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// FETCH CONTRACT
// ============================================================================

/// Per-fetch inputs besides the descriptor.
#[derive(Debug, Clone, Default)]
pub struct FetchContext {
    /// Caller props: URL placeholders, query variables.
    pub props: Option<Value>,
    /// Target → source path table applied to the payload.
    pub field_map: Option<FieldMap>,
    pub cancel: CancelSignal,
    /// Cache-bust scope. A fresh context starts a fresh scope.
    pub shapes: Arc<ShapeTracker>,
}

impl FetchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_props(mut self, props: Value) -> Self {
        self.props = Some(props);
        self
    }

    pub fn with_field_map(mut self, field_map: FieldMap) -> Self {
        self.field_map = Some(field_map);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Share a cache-bust scope with other fetches, e.g. every refresh of
    /// one chart instance.
    pub fn with_shapes(mut self, shapes: Arc<ShapeTracker>) -> Self {
        self.shapes = shapes;
        self
    }
}

/// A data source adapter.
#[async_trait]
pub trait DataSourceAdapter: Send + Sync {
    /// The descriptor tag this adapter serves.
    fn kind(&self) -> SourceKind;

    /// Fetch and apply the context's path table. The result has not been
    /// checked against the canonical shape.
    async fn fetch_json(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<Value>;

    /// Fetch and decode leniently into the canonical response.
    async fn fetch(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<ChartResponse> {
        let payload = self.fetch_json(descriptor, ctx).await?;
        Ok(ChartResponse::from_value_lossy(&payload))
    }
}

/// Apply the optional path table.
pub(crate) fn apply_field_map(payload: Value, field_map: Option<&FieldMap>) -> Value {
    match field_map {
        Some(table) if !table.is_empty() => map_payload(&payload, table),
        _ => payload,
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

/// Adapter factory. The request adapter is shared across calls so its cache
/// survives; the other two are stateless.
#[derive(Clone)]
pub struct SourceAdapters {
    request: Arc<RequestAdapter>,
    query: Arc<QueryAdapter>,
    stream: Arc<StreamAdapter>,
}

impl SourceAdapters {
    /// Build all three adapters over `transport` using `config`.
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ChartwellConfig) -> Self {
        let timeout = config.request_timeout();
        let request = RequestAdapter::new(Arc::clone(&transport))
            .with_retry(config.retry.clone())
            .with_timeout(timeout)
            .with_cache(&config.cache);
        let query = QueryAdapter::new(transport).with_timeout(timeout);
        let stream = StreamAdapter::new(&config.stream);

        Self {
            request: Arc::new(request),
            query: Arc::new(query),
            stream: Arc::new(stream),
        }
    }

    /// Adapters over a real HTTP client.
    pub fn with_reqwest(config: &ChartwellConfig) -> Self {
        Self::new(Arc::new(ReqwestTransport::new()), config)
    }

    pub fn request_adapter(&self) -> &Arc<RequestAdapter> {
        &self.request
    }

    /// Pick the adapter for `descriptor`.
    pub fn adapter_for(&self, descriptor: &DataSourceDescriptor) -> Arc<dyn DataSourceAdapter> {
        match descriptor.kind() {
            SourceKind::Rest => self.request.clone(),
            SourceKind::Graphql => self.query.clone(),
            SourceKind::Stream => self.stream.clone(),
        }
    }

    /// Note the descriptor's shape in the context's scope, dispatch and
    /// fetch, returning the mapped but unchecked payload.
    pub async fn fetch_json(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<Value> {
        let cache_bust = ctx.shapes.observe(descriptor);
        let adapter = self.adapter_for(descriptor);
        tracing::debug!(
            kind = %descriptor.kind(),
            url = %descriptor.url(),
            cache_bust,
            "Fetching chart data"
        );
        adapter.fetch_json(descriptor, ctx).await
    }

    /// [`SourceAdapters::fetch_json`] decoded into the canonical response.
    pub async fn fetch(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<ChartResponse> {
        let payload = self.fetch_json(descriptor, ctx).await?;
        Ok(ChartResponse::from_value_lossy(&payload))
    }
}

impl std::fmt::Debug for SourceAdapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceAdapters")
            .field("request", &self.request)
            .field("query", &self.query)
            .field("stream", &self.stream)
            .finish()
    }
}
