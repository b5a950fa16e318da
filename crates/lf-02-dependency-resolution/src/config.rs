//! Resolution limits and feature gates.

use serde::{Deserialize, Serialize};
use std::env;

/// Limits for one resolution run and the counterparty platform versions
/// that enable optional protocol features.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// Largest backchain a single run will download.
    pub max_transactions: usize,
    /// Minimum counterparty platform version for multi-hash requests.
    pub batch_fetch_min_platform_version: u32,
    /// Minimum counterparty platform version for network parameter fetch.
    pub parameters_fetch_min_platform_version: u32,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            max_transactions: 5_000,
            batch_fetch_min_platform_version: 4,
            parameters_fetch_min_platform_version: 4,
        }
    }
}

impl ResolutionConfig {
    /// Create configuration from environment variables.
    ///
    /// - `LF_RESOLUTION_MAX_TRANSACTIONS`: backchain limit (default: 5000)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_transactions: env::var("LF_RESOLUTION_MAX_TRANSACTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_transactions),
            ..defaults
        }
    }

    /// Whether a peer at `platform_version` accepts batched requests.
    pub fn supports_batch_fetch(&self, platform_version: Option<u32>) -> bool {
        platform_version.is_some_and(|v| v >= self.batch_fetch_min_platform_version)
    }

    pub fn supports_parameters_fetch(&self, platform_version: Option<u32>) -> bool {
        platform_version.is_some_and(|v| v >= self.parameters_fetch_min_platform_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_gates_follow_platform_version() {
        let config = ResolutionConfig::default();
        assert!(config.supports_batch_fetch(Some(4)));
        assert!(!config.supports_batch_fetch(Some(3)));
        assert!(!config.supports_batch_fetch(None));
        assert!(config.supports_parameters_fetch(Some(5)));
    }
}
