//! Telemetry configuration from environment variables.

use std::env;

/// Configuration for log output.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to every log line
    pub service_name: String,

    /// Node legal name, when the process hosts a single node
    pub node_name: Option<String>,

    /// Log level filter (trace, debug, info, warn, error) or a full
    /// `EnvFilter` directive string
    pub log_level: String,

    /// Whether to enable console output
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "ledger-finality".to_string(),
            node_name: None,
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LF_SERVICE_NAME`: Service name (default: ledger-finality)
    /// - `LF_NODE_NAME`: Node legal name (default: unset)
    /// - `LF_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `LF_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `LF_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();

        Self {
            service_name: env::var("LF_SERVICE_NAME")
                .unwrap_or_else(|_| "ledger-finality".to_string()),

            node_name: env::var("LF_NODE_NAME").ok(),

            log_level: env::var("LF_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            console_output: env::var("LF_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),

            json_logs: env::var("LF_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(is_container),
        }
    }

    /// Configuration for a named node.
    pub fn for_node(node_name: &str) -> Self {
        let mut config = Self::from_env();
        config.node_name = Some(node_name.to_string());
        config
    }

    /// Service name including the node, if any.
    pub fn full_service_name(&self) -> String {
        match &self.node_name {
            Some(node) => format!("{}-{}", self.service_name, node),
            None => self.service_name.clone(),
        }
    }
}
