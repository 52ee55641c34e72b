//! Request/response adapter with caching, retry and timeout.

use crate::cancel::CancelSignal;
use crate::transport::{decode_json, query_pairs, send_with_deadline, HttpRequest, HttpTransport};
use crate::{apply_field_map, DataSourceAdapter, FetchContext};
use async_trait::async_trait;
use chartwell_cache::{fingerprint, CacheStats, FingerprintInput, TtlCache};
use chartwell_core::{
    CacheSettings, DataSourceDescriptor, FetchError, FetchResult, RequestSource,
    RetryConfig, SourceKind,
};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Fetches [`RequestSource`]s over HTTP.
///
/// Decoded payloads are cached by request fingerprint. The fingerprint
/// includes the cache-bust counter of the caller's [`crate::ShapeTracker`].
pub struct RequestAdapter {
    transport: Arc<dyn HttpTransport>,
    retry: RetryConfig,
    timeout: Duration,
    cache: Option<Mutex<TtlCache<String, Value>>>,
}

impl RequestAdapter {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        let settings = CacheSettings::default();
        Self {
            transport,
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(10),
            cache: Some(Mutex::new(TtlCache::new(settings.capacity, settings.ttl()))),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the cache according to `settings`. Disabled settings remove it.
    pub fn with_cache(mut self, settings: &CacheSettings) -> Self {
        self.cache = settings
            .enabled
            .then(|| Mutex::new(TtlCache::new(settings.capacity, settings.ttl())));
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.cache = None;
        self
    }

    /// Drop every cached payload.
    pub fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            lock(cache).clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| lock(cache).stats())
            .unwrap_or_default()
    }

    /// Fetch a request source, returning the decoded (unmapped) payload.
    pub async fn fetch_payload(
        &self,
        source: &RequestSource,
        props: Option<&Value>,
        cancel: &CancelSignal,
        cache_bust: u64,
    ) -> FetchResult<Value> {
        let url = substitute_placeholders(&source.url, props);
        let method = source.method();
        let key = fingerprint(&FingerprintInput::for_request(
            source,
            &method,
            &url,
            cache_bust,
        ));

        if let Some(cache) = &self.cache {
            let cached = lock(cache).get(&key).cloned();
            if let Some(payload) = cached {
                tracing::debug!(url = %url, "Response cache hit");
                return Ok(payload);
            }
            tracing::debug!(url = %url, "Response cache miss");
        }

        let mut request = HttpRequest::new(method, url.clone())
            .with_headers(source.headers.clone())
            .with_query(query_pairs(&source.params));
        if let Some(body) = &source.body {
            request = request.with_json_body(body.clone());
        }

        let payload = self.send_with_retry(request, cancel).await?;

        if let Some(cache) = &self.cache {
            lock(cache).insert(key, payload.clone());
        }
        Ok(payload)
    }

    /// Up to `max_retries + 1` attempts with exponential backoff. Errors that
    /// are not retryable (cancellation) end the loop at once.
    async fn send_with_retry(
        &self,
        request: HttpRequest,
        cancel: &CancelSignal,
    ) -> FetchResult<Value> {
        let total_attempts = self.retry.max_retries.saturating_add(1);
        let mut attempt = 0u32;

        loop {
            let outcome = send_with_deadline(
                self.transport.as_ref(),
                request.clone(),
                self.timeout,
                cancel,
            )
            .await
            .and_then(|response| decode_json(&request.url, &response));

            let error = match outcome {
                Ok(payload) => return Ok(payload),
                Err(e) => e,
            };

            attempt += 1;
            if !error.is_retryable() || attempt >= total_attempts {
                return Err(error);
            }

            let delay = self.retry.backoff_for(attempt - 1);
            tracing::warn!(
                url = %request.url,
                attempt,
                max_attempts = total_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Fetch attempt failed, retrying"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl std::fmt::Debug for RequestAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestAdapter")
            .field("retry", &self.retry)
            .field("timeout", &self.timeout)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

#[async_trait]
impl DataSourceAdapter for RequestAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Rest
    }

    async fn fetch_json(
        &self,
        descriptor: &DataSourceDescriptor,
        ctx: &FetchContext,
    ) -> FetchResult<Value> {
        let DataSourceDescriptor::Rest(source) = descriptor else {
            return Err(FetchError::invalid_source(format!(
                "request adapter cannot fetch a {} source",
                descriptor.kind()
            )));
        };
        let payload = self
            .fetch_payload(
                source,
                ctx.props.as_ref(),
                &ctx.cancel,
                ctx.shapes.cache_bust(),
            )
            .await?;
        Ok(apply_field_map(payload, ctx.field_map.as_ref()))
    }
}

/// Replace `${name}` and `{name}` placeholders with top-level props.
/// Unknown names are left untouched.
pub fn substitute_placeholders(url: &str, props: Option<&Value>) -> String {
    let Some(props) = props.and_then(Value::as_object) else {
        return url.to_string();
    };

    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}').map(|i| open + i) else {
            break;
        };
        let name = &rest[open + 1..close];
        let dollar = open > 0 && rest.as_bytes()[open - 1] == b'$';
        let prefix_end = if dollar { open - 1 } else { open };

        match props.get(name.trim()) {
            Some(value) if !name.is_empty() => {
                out.push_str(&rest[..prefix_end]);
                match value {
                    Value::String(s) => out.push_str(s),
                    other => out.push_str(&other.to_string()),
                }
            }
            _ => out.push_str(&rest[..=close]),
        }
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    out
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_placeholders() {
        let props = json!({"region": "emea", "year": 2024});
        assert_eq!(
            substitute_placeholders("https://a/${region}/{year}?x={missing}", Some(&props)),
            "https://a/emea/2024?x={missing}"
        );
        assert_eq!(
            substitute_placeholders("https://a/{region}", None),
            "https://a/{region}"
        );
        assert_eq!(
            substitute_placeholders("https://a/{unterminated", Some(&props)),
            "https://a/{unterminated"
        );
    }
}
