//! CHARTWELL Core - Shared Types
//!
//! Plain data structures shared by every other crate in the workspace:
//! schema property values, data source descriptors, the canonical chart
//! response handed to renderers, theme variables, errors and configuration.
//! This crate contains no I/O beyond loading a configuration file.

pub mod config;
pub mod error;
pub mod response;
pub mod source;
pub mod value;
pub mod variables;

pub use config::{CacheSettings, ChartwellConfig, RetryConfig, StreamSettings};
pub use error::{ChartError, ChartResult, ConfigError, EvalError, FetchError, FetchResult};
pub use response::{ChartResponse, DataPoints, Dataset, Point, ResponseMeta};
pub use source::{DataSourceDescriptor, QuerySource, RequestSource, SourceKind, StreamSource};
pub use value::{
    insert_path, is_json_path, is_variable_reference, lookup_path, Callback, ConfigMap,
    ConfigValue, FunctionCall, FieldMap, JSON_PATH_ROOT, VARIABLE_SIGIL,
};
pub use variables::VariableSet;

/// Reserved top-level schema keys with meaning to the resolver.
pub mod keys {
    pub const TYPE: &str = "type";
    pub const SOURCE: &str = "source";
    pub const EXTENDS: &str = "extends";
    pub const MAP: &str = "map";
}
