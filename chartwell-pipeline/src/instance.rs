//! Chart instances
//!
//! A [`ChartInstance`] owns one chart's DSL and props plus the latest
//! rendered description. Refreshes may overlap; each takes a sequence
//! number when it starts and its result is applied only if, on completion,
//! it is still the newest refresh and the instance's configuration has not
//! changed in between. Anything else is discarded silently.
//!
//! Each instance owns its cache-bust scope: only this chart's own change of
//! source shape busts its cached payloads.

use crate::pipeline::{ChartDescription, ChartPipeline};
use chartwell_core::ChartResult;
use chartwell_sources::{CancelHandle, CancelSignal, ShapeTracker};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

/// What happened to a finished refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Applied,
    /// A newer refresh started, or the configuration changed, while this
    /// one was in flight.
    Discarded,
}

#[derive(Debug, Default)]
struct InstanceState {
    dsl: String,
    props: Option<Value>,
    config_version: u64,
    current: Option<ChartDescription>,
}

pub struct ChartInstance {
    id: Uuid,
    pipeline: Arc<ChartPipeline>,
    state: Mutex<InstanceState>,
    sequence: AtomicU64,
    cancel: CancelHandle,
    signal: CancelSignal,
    shapes: Arc<ShapeTracker>,
}

impl ChartInstance {
    pub fn new(pipeline: Arc<ChartPipeline>, dsl: impl Into<String>) -> Self {
        let (cancel, signal) = CancelSignal::pair();
        Self {
            id: Uuid::now_v7(),
            pipeline,
            state: Mutex::new(InstanceState {
                dsl: dsl.into(),
                ..Default::default()
            }),
            sequence: AtomicU64::new(0),
            cancel,
            signal,
            shapes: Arc::new(ShapeTracker::new()),
        }
    }

    pub fn with_props(self, props: Value) -> Self {
        self.lock().props = Some(props);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn pipeline(&self) -> &Arc<ChartPipeline> {
        &self.pipeline
    }

    /// Cache-bust counter of this instance's scope.
    pub fn cache_bust(&self) -> u64 {
        self.shapes.cache_bust()
    }

    /// Number of refreshes started so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn config_version(&self) -> u64 {
        self.lock().config_version
    }

    pub fn dsl(&self) -> String {
        self.lock().dsl.clone()
    }

    /// The most recently applied description.
    pub fn current(&self) -> Option<ChartDescription> {
        self.lock().current.clone()
    }

    /// Replace the DSL. In-flight refreshes will be discarded.
    pub fn update_dsl(&self, dsl: impl Into<String>) {
        let mut state = self.lock();
        state.dsl = dsl.into();
        state.config_version += 1;
    }

    /// Replace the props. In-flight refreshes will be discarded.
    pub fn update_props(&self, props: Option<Value>) {
        let mut state = self.lock();
        state.props = props;
        state.config_version += 1;
    }

    /// Abort in-flight fetches and stop periodic refresh.
    pub fn teardown(&self) {
        tracing::debug!(instance_id = %self.id, "Tearing down chart instance");
        self.cancel.cancel();
    }

    pub fn is_torn_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Render the current DSL and apply the result unless it went stale.
    pub async fn refresh(&self) -> ChartResult<RefreshOutcome> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let (dsl, props, version) = {
            let state = self.lock();
            (state.dsl.clone(), state.props.clone(), state.config_version)
        };

        let result = self
            .pipeline
            .render_scoped(&dsl, props.as_ref(), &self.signal, &self.shapes)
            .await;

        let mut state = self.lock();
        let latest = self.sequence.load(Ordering::SeqCst);
        if latest != sequence || state.config_version != version {
            tracing::debug!(
                instance_id = %self.id,
                sequence,
                latest,
                config_changed = state.config_version != version,
                "Discarding stale chart result"
            );
            return Ok(RefreshOutcome::Discarded);
        }

        state.current = Some(result?);
        Ok(RefreshOutcome::Applied)
    }

    fn lock(&self) -> MutexGuard<'_, InstanceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ChartInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartInstance")
            .field("id", &self.id)
            .field("sequence", &self.sequence())
            .field("config_version", &self.config_version())
            .finish()
    }
}

// ============================================================================
// PERIODIC REFRESH
// ============================================================================

/// Counters from one periodic refresh task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub applied: u64,
    pub discarded: u64,
    pub failed: u64,
}

/// Refresh `instance` every `period` until `shutdown_rx` turns true, the
/// sender is dropped, or the instance is torn down.
pub fn spawn_stream_refresh(
    instance: Arc<ChartInstance>,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<RefreshStats> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let torn_down = instance.signal.clone();
        let mut stats = RefreshStats::default();

        tracing::debug!(
            instance_id = %instance.id(),
            period_ms = period.as_millis() as u64,
            "Stream refresh started"
        );

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }

                _ = torn_down.cancelled() => break,

                _ = ticker.tick() => {
                    match instance.refresh().await {
                        Ok(RefreshOutcome::Applied) => stats.applied += 1,
                        Ok(RefreshOutcome::Discarded) => stats.discarded += 1,
                        Err(e) => {
                            stats.failed += 1;
                            tracing::warn!(
                                instance_id = %instance.id(),
                                error = %e,
                                "Stream refresh failed"
                            );
                        }
                    }
                }
            }
        }

        tracing::debug!(
            instance_id = %instance.id(),
            applied = stats.applied,
            discarded = stats.discarded,
            failed = stats.failed,
            "Stream refresh stopped"
        );
        stats
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chartwell_core::ChartwellConfig;
    use chartwell_test_utils::fixtures::canonical_payload;
    use chartwell_test_utils::MockTransport;

    fn instance(dsl: &str) -> ChartInstance {
        let pipeline = ChartPipeline::new(
            ChartwellConfig::default(),
            Arc::new(MockTransport::json(canonical_payload())),
        );
        ChartInstance::new(Arc::new(pipeline), dsl)
    }

    #[tokio::test]
    async fn test_refresh_applies() {
        let chart = instance("type: bar;\nsource: \"https://a\";");
        assert!(chart.current().is_none());
        assert_eq!(chart.refresh().await.unwrap(), RefreshOutcome::Applied);
        assert_eq!(chart.sequence(), 1);
        assert_eq!(chart.current().unwrap().response.labels, vec!["Q1", "Q2"]);
    }

    #[test]
    fn test_updates_bump_version() {
        let chart = instance("type: bar;");
        chart.update_dsl("type: line;");
        chart.update_props(None);
        assert_eq!(chart.config_version(), 2);
        assert_eq!(chart.dsl(), "type: line;");
    }

    #[test]
    fn test_ids_are_v7() {
        let a = instance("type: bar;");
        let b = instance("type: bar;");
        assert_eq!(a.id().get_version_num(), 7);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_teardown_cancels_refresh() {
        let chart = instance("source: \"https://a\";");
        chart.teardown();
        assert!(chart.is_torn_down());
        assert!(chart.refresh().await.is_err());
        assert!(chart.current().is_none());
    }
}
