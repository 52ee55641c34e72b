//! Runtime configuration.
//!
//! Loaded from TOML. Every section may be omitted, in which case the
//! defaults below apply. Unknown keys are rejected.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file for [`ChartwellConfig::load`].
pub const CONFIG_ENV_VAR: &str = "CHARTWELL_CONFIG";

/// Retry configuration for data fetches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (0-based), capped at the maximum.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let ms = (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64);
        Duration::from_millis(ms.max(0.0) as u64)
    }
}

/// Response cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl_ms: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 100,
            ttl_ms: 5 * 60 * 1000,
        }
    }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Simulated stream settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamSettings {
    pub refresh_interval_ms: u64,
    /// Maximum relative perturbation applied to baseline values (0.1 = ±10%).
    pub jitter_pct: f64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 5_000,
            jitter_pct: 0.1,
        }
    }
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChartwellConfig {
    pub request_timeout_ms: u64,
    pub token_limit: usize,
    pub retry: RetryConfig,
    pub cache: CacheSettings,
    pub stream: StreamSettings,
}

impl Default for ChartwellConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            token_limit: 1000,
            retry: RetryConfig::default(),
            cache: CacheSettings::default(),
            stream: StreamSettings::default(),
        }
    }
}

impl ChartwellConfig {
    /// Load from the file named by `CHARTWELL_CONFIG`, or defaults when unset.
    pub fn load() -> Result<Self, ConfigError> {
        match std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from) {
            Some(path) => Self::from_path(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ChartwellConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_stream(mut self, stream: StreamSettings) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_token_limit(mut self, limit: usize) -> Self {
        self.token_limit = limit;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.token_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "token_limit",
                reason: "must be > 0".to_string(),
            });
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.multiplier",
                reason: "must be >= 1.0".to_string(),
            });
        }
        if self.retry.max_backoff_ms < self.retry.initial_backoff_ms {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_backoff_ms",
                reason: "must be >= initial_backoff_ms".to_string(),
            });
        }
        if self.cache.enabled && self.cache.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.capacity",
                reason: "must be > 0 when the cache is enabled".to_string(),
            });
        }
        if self.cache.enabled && self.cache.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.ttl_ms",
                reason: "must be > 0 when the cache is enabled".to_string(),
            });
        }
        if self.stream.refresh_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "stream.refresh_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.stream.jitter_pct) {
            return Err(ConfigError::InvalidValue {
                field: "stream.jitter_pct",
                reason: "must be between 0.0 and 1.0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = ChartwellConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config = ChartwellConfig::from_toml_str(
            r#"
            request_timeout_ms = 2500

            [cache]
            capacity = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.request_timeout_ms, 2500);
        assert_eq!(config.cache.capacity, 8);
        assert!(config.cache.enabled);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ChartwellConfig::from_toml_str("bogus = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_rejects_bad_multiplier() {
        let config = ChartwellConfig::default().with_retry(RetryConfig {
            multiplier: 0.5,
            ..RetryConfig::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "retry.multiplier",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_jitter_out_of_range() {
        let config = ChartwellConfig::default().with_stream(StreamSettings {
            jitter_pct: 1.5,
            ..StreamSettings::default()
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            multiplier: 2.0,
        };
        assert_eq!(retry.backoff_for(0), Duration::from_millis(100));
        assert_eq!(retry.backoff_for(1), Duration::from_millis(200));
        assert_eq!(retry.backoff_for(2), Duration::from_millis(350));
        assert_eq!(retry.backoff_for(10), Duration::from_millis(350));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "token_limit = 64\n[stream]\njitter_pct = 0.2").unwrap();

        let config = ChartwellConfig::from_path(file.path()).unwrap();
        assert_eq!(config.token_limit, 64);
        assert_eq!(config.stream.jitter_pct, 0.2);
    }

    #[test]
    fn test_from_path_missing_file() {
        let err = ChartwellConfig::from_path(Path::new("/nonexistent/chartwell.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
