//! Aggregator configuration.
//!
//! Values come from defaults, environment variables (`from_env`) or a TOML
//! file (`load`). Validation mirrors the engine's construction checks so a bad
//! config fails early with the same `InvalidArgument` error.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AggregatorError, AggregatorResult};

/// Default number of keys the store is sized for.
pub const DEFAULT_INITIAL_CAPACITY: usize = 100;

/// Default debounce window in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Tunables for an [`Aggregator`](crate::Aggregator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Approximate number of distinct keys (sizing hint only).
    pub initial_capacity: usize,

    /// Debounce window length in milliseconds.
    pub delay_ms: u64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_CAPACITY,
            delay_ms: DEFAULT_DELAY_MS,
        }
    }
}

impl AggregatorConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("AGGREGATOR_INITIAL_CAPACITY") {
            if let Ok(n) = val.parse() {
                config.initial_capacity = n;
            }
        }
        if let Ok(val) = std::env::var("AGGREGATOR_DELAY_MS") {
            if let Ok(ms) = val.parse() {
                config.delay_ms = ms;
            }
        }

        config
    }

    /// Parse config from a TOML document. Missing fields keep their defaults.
    pub fn from_toml_str(raw: &str) -> AggregatorResult<Self> {
        toml::from_str(raw).map_err(|e| AggregatorError::invalid_argument("config", e.to_string()))
    }

    /// Load config from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> AggregatorResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AggregatorError::invalid_argument("config", format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Debounce window as a `Duration`.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Reject values the engine would refuse at construction.
    pub fn validate(&self) -> AggregatorResult<()> {
        if self.initial_capacity == 0 {
            return Err(AggregatorError::invalid_argument(
                "initial_capacity",
                "should be more than zero",
            ));
        }
        if self.delay_ms == 0 {
            return Err(AggregatorError::invalid_argument(
                "delay",
                "must be more than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AggregatorConfig::default();
        assert_eq!(config.initial_capacity, 100);
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AggregatorConfig::from_toml_str("delay_ms = 250").unwrap();
        assert_eq!(config.delay_ms, 250);
        assert_eq!(config.initial_capacity, DEFAULT_INITIAL_CAPACITY);
    }

    #[test]
    fn test_malformed_toml_is_invalid_argument() {
        let err = AggregatorConfig::from_toml_str("delay_ms = \"soon\"").unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidArgument { ref name, .. } if name == "config"));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let zero_capacity = AggregatorConfig {
            initial_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_capacity.validate(),
            Err(AggregatorError::InvalidArgument { ref name, .. }) if name == "initial_capacity"
        ));

        let zero_delay = AggregatorConfig {
            delay_ms: 0,
            ..Default::default()
        };
        assert!(matches!(
            zero_delay.validate(),
            Err(AggregatorError::InvalidArgument { ref name, .. }) if name == "delay"
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "initial_capacity = 8\ndelay_ms = 40").unwrap();

        let config = AggregatorConfig::load(file.path()).unwrap();
        assert_eq!(config.initial_capacity, 8);
        assert_eq!(config.delay(), Duration::from_millis(40));
    }

    #[test]
    fn test_load_missing_file() {
        let err = AggregatorConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, AggregatorError::InvalidArgument { .. }));
    }
}
