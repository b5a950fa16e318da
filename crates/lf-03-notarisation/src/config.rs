//! Notary service configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Settings for a notary service and its uniqueness provider.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotaryConfig {
    /// Verify full transaction contents and backchains before committing.
    pub validating: bool,
    /// Slack applied to both ends of a transaction's time window.
    pub time_tolerance_ms: u64,
    /// Most commit requests processed as one batch.
    pub batch_size: usize,
    /// How long the writer waits to fill a batch after the first request.
    pub batch_timeout_ms: u64,
    /// Most inputs plus references one transaction may ask to commit.
    pub max_input_states: usize,
    /// Pending commit requests before callers are made to wait.
    pub request_queue_size: usize,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            validating: false,
            time_tolerance_ms: 30_000,
            batch_size: 32,
            batch_timeout_ms: 1,
            max_input_states: 2_000,
            request_queue_size: 10_000,
        }
    }
}

impl NotaryConfig {
    pub fn validating() -> Self {
        Self {
            validating: true,
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LF_NOTARY_VALIDATING`: `true` for a validating notary (default: false)
    /// - `LF_NOTARY_TIME_TOLERANCE_MS`: time window slack (default: 30000)
    /// - `LF_NOTARY_BATCH_SIZE`: requests per commit batch (default: 32)
    /// - `LF_NOTARY_BATCH_TIMEOUT_MS`: batch fill wait (default: 1)
    /// - `LF_NOTARY_MAX_INPUT_STATES`: per-transaction state limit (default: 2000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            validating: parse_env("LF_NOTARY_VALIDATING").unwrap_or(defaults.validating),
            time_tolerance_ms: parse_env("LF_NOTARY_TIME_TOLERANCE_MS").unwrap_or(defaults.time_tolerance_ms),
            batch_size: parse_env("LF_NOTARY_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.batch_size),
            batch_timeout_ms: parse_env("LF_NOTARY_BATCH_TIMEOUT_MS").unwrap_or(defaults.batch_timeout_ms),
            max_input_states: parse_env("LF_NOTARY_MAX_INPUT_STATES").unwrap_or(defaults.max_input_states),
            request_queue_size: defaults.request_queue_size,
        }
    }

    pub fn time_tolerance(&self) -> Duration {
        Duration::from_millis(self.time_tolerance_ms)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NotaryConfig::default();
        assert!(!config.validating);
        assert_eq!(config.time_tolerance(), Duration::from_secs(30));
        assert_eq!(config.batch_size, 32);
        assert!(NotaryConfig::validating().validating);
    }
}
