//! CHARTWELL Pipeline - Chart Compilation and Data Resolution
//!
//! Ties the workspace together: DSL text goes in, a renderer-ready chart
//! description comes out.
//!
//! ```text
//! DSL text ──▶ parse ──▶ resolve (registry, variables, props) ──▶ validate schema
//!                                                                      │
//!                         ┌────────────────────────────────────────────┘
//!                         ▼
//!            DataSourceDescriptor ──▶ SourceAdapters ──▶ ChartResponse
//!                                                            │
//!                                                 validate response
//!                                                            ▼
//!                                                   ChartDescription
//! ```
//!
//! [`ChartInstance`] wraps the pipeline for one long-lived chart and drops
//! results that went stale while in flight; [`spawn_stream_refresh`] drives
//! it on a timer for stream sources.

pub mod instance;
pub mod pipeline;

pub use instance::{spawn_stream_refresh, ChartInstance, RefreshOutcome, RefreshStats};
pub use pipeline::{ChartDescription, ChartPipeline, CompiledChart};

pub use chartwell_core::{ChartError, ChartResult, ChartwellConfig};
pub use chartwell_sources::{CancelHandle, CancelSignal};
