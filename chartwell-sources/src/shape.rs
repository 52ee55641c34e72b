//! Per-scope cache-bust counter.
//!
//! A [`ShapeTracker`] remembers the shape of the last source fetched in its
//! scope and bumps a counter whenever the next one differs. The request
//! adapter folds the counter into its cache fingerprint. Scopes are
//! independent: one chart switching source kinds never busts another
//! chart's cached payloads.

use chartwell_core::DataSourceDescriptor;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct ShapeState {
    signature: Option<String>,
    cache_bust: u64,
}

#[derive(Debug, Default)]
pub struct ShapeTracker {
    state: Mutex<ShapeState>,
}

impl ShapeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the shape of the source about to be fetched and return the
    /// counter. The first observation never bumps it.
    pub fn observe(&self, descriptor: &DataSourceDescriptor) -> u64 {
        let signature = descriptor.shape_signature();
        let mut state = self.lock();
        if state.signature.as_deref() != Some(signature.as_str()) {
            if state.signature.is_some() {
                state.cache_bust += 1;
                tracing::debug!(
                    shape = %signature,
                    cache_bust = state.cache_bust,
                    "Source shape changed, busting cache"
                );
            }
            state.signature = Some(signature);
        }
        state.cache_bust
    }

    pub fn cache_bust(&self) -> u64 {
        self.lock().cache_bust
    }

    fn lock(&self) -> MutexGuard<'_, ShapeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_core::{QuerySource, RequestSource, StreamSource};

    fn rest() -> DataSourceDescriptor {
        DataSourceDescriptor::Rest(RequestSource::get("https://api.test/sales"))
    }

    fn stream() -> DataSourceDescriptor {
        DataSourceDescriptor::Stream(StreamSource {
            url: "wss://api.test/live".to_string(),
            refresh_interval_ms: None,
        })
    }

    #[test]
    fn test_same_shape_keeps_counter() {
        let tracker = ShapeTracker::new();
        assert_eq!(tracker.observe(&rest()), 0);
        assert_eq!(tracker.observe(&rest()), 0);
    }

    #[test]
    fn test_each_change_bumps_once() {
        let tracker = ShapeTracker::new();
        tracker.observe(&rest());
        let query = DataSourceDescriptor::Graphql(QuerySource {
            url: "https://api.test/graphql".to_string(),
            query: "{ sales }".to_string(),
            variables: Default::default(),
            headers: Default::default(),
        });
        assert_eq!(tracker.observe(&query), 1);
        assert_eq!(tracker.observe(&rest()), 2);
        assert_eq!(tracker.cache_bust(), 2);
    }

    #[test]
    fn test_trackers_are_independent() {
        let a = ShapeTracker::new();
        let b = ShapeTracker::new();
        a.observe(&rest());
        b.observe(&stream());
        b.observe(&rest());
        assert_eq!(a.observe(&rest()), 0);
        assert_eq!(b.cache_bust(), 1);
    }
}
