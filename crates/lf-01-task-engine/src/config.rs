//! Flow engine configuration.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Engine settings shared by every flow on a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowConfig {
    /// How long a retrying send-and-receive waits for each response.
    pub receive_timeout_ms: u64,
    /// Re-send attempts after the first before giving up.
    pub max_retries: u32,
    /// Base of the exponential back-off between attempts.
    pub backoff_base_ms: u64,
    /// Upper bound for a single back-off.
    pub backoff_max_ms: u64,
    /// Platform version this node advertises and signs with.
    pub platform_version: u32,
    /// Application name advertised to counterparties.
    pub app_name: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 30_000,
            max_retries: 3,
            backoff_base_ms: 500,
            backoff_max_ms: 10_000,
            platform_version: shared_types::PLATFORM_VERSION,
            app_name: "ledger-finality".to_string(),
        }
    }
}

impl FlowConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LF_FLOW_TIMEOUT_MS`: retry receive timeout (default: 30000)
    /// - `LF_FLOW_MAX_RETRIES`: re-send attempts (default: 3)
    /// - `LF_FLOW_BACKOFF_BASE_MS`: back-off base (default: 500)
    /// - `LF_PLATFORM_VERSION`: advertised platform version
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            receive_timeout_ms: parse_env("LF_FLOW_TIMEOUT_MS").unwrap_or(defaults.receive_timeout_ms),
            max_retries: parse_env("LF_FLOW_MAX_RETRIES").unwrap_or(defaults.max_retries),
            backoff_base_ms: parse_env("LF_FLOW_BACKOFF_BASE_MS").unwrap_or(defaults.backoff_base_ms),
            backoff_max_ms: defaults.backoff_max_ms,
            platform_version: parse_env("LF_PLATFORM_VERSION").unwrap_or(defaults.platform_version),
            app_name: defaults.app_name,
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Back-off before attempt `attempt` (1-based retry count).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
        let ms = self.backoff_base_ms.saturating_mul(factor).min(self.backoff_max_ms);
        Duration::from_millis(ms)
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
