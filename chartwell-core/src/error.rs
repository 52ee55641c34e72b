//! Error types for Chartwell operations
//!
//! Parse, resolution and validation problems are collected into lists and
//! returned next to a best-effort result (see `chartwell-dsl`). The types here
//! cover failures that abort an operation: data fetches, configuration loading
//! and callback evaluation.

use thiserror::Error;

/// Data fetch errors. Each failure reason is a distinct variant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Network request to {url} failed: {message}")]
    Network { url: String, message: String },

    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    #[error("Expected JSON response but got content type '{content_type}'")]
    ContentType { content_type: String },

    #[error("Failed to decode JSON response: {reason}")]
    Decode { reason: String },

    #[error("Query returned errors: {messages}")]
    Query { messages: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Invalid data source: {reason}")]
    InvalidSource { reason: String },
}

impl FetchError {
    /// Whether the retry policy may attempt the call again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FetchError::Cancelled | FetchError::InvalidSource { .. })
    }

    pub fn invalid_source(reason: impl Into<String>) -> Self {
        FetchError::InvalidSource {
            reason: reason.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Failure while evaluating an interpolation callback.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Expression evaluation failed: {reason}")]
pub struct EvalError {
    pub reason: String,
}

impl EvalError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Master error type for all Chartwell errors.
#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Eval error: {0}")]
    Eval(#[from] EvalError),

    #[error("Resolved configuration has no data source")]
    MissingSource,
}

/// Result type alias for Chartwell operations.
pub type ChartResult<T> = Result<T, ChartError>;

/// Result type alias for data fetches.
pub type FetchResult<T> = Result<T, FetchError>;
