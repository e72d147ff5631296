//! Configuration for the Prometheus sink.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Validation error: {0}")]
    Validation(String),
}

/// How readings are exported to Prometheus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MetricsMode {
    /// Gauges are served on an HTTP endpoint for scraping.
    Pull,
    /// Gauges are pushed to a gateway after every window.
    Push,
    /// No Prometheus export.
    #[default]
    #[serde(alias = "disabled")]
    Disable,
}

impl MetricsMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricsMode::Pull => "pull",
            MetricsMode::Push => "push",
            MetricsMode::Disable => "disable",
        }
    }
}

impl std::fmt::Display for MetricsMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper bound for a single push.
pub const MAX_PUSH_TIMEOUT_MS: u64 = 300_000;

/// Prometheus export configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrometheusConfig {
    /// Export mode (default: "disable").
    #[serde(default)]
    pub mode: MetricsMode,

    /// Address the pull endpoint listens on (default: "0.0.0.0:9320").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the metrics endpoint (default: "/metrics").
    #[serde(default = "default_path")]
    pub path: String,

    /// Push gateway `host:port` (default: "localhost:9091").
    #[serde(default = "default_gateway")]
    pub gateway: String,

    /// Job name for pushed metrics. Resolved to the host name when unset.
    #[serde(default)]
    pub job: Option<String>,

    /// Timeout for a single push (milliseconds).
    #[serde(default = "default_push_timeout")]
    pub push_timeout_ms: u64,
}

fn default_listen() -> String {
    "0.0.0.0:9320".to_string()
}

fn default_path() -> String {
    "/metrics".to_string()
}

fn default_gateway() -> String {
    "localhost:9091".to_string()
}

fn default_push_timeout() -> u64 {
    5000
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self {
            mode: MetricsMode::default(),
            listen: default_listen(),
            path: default_path(),
            gateway: default_gateway(),
            job: None,
            push_timeout_ms: default_push_timeout(),
        }
    }
}

impl PrometheusConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Validation(format!(
                "Invalid listen address: {}",
                self.listen
            )));
        }

        if !self.path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.gateway.trim().is_empty() {
            return Err(ConfigError::Validation(
                "Push gateway address must not be empty".to_string(),
            ));
        }

        if self.push_timeout_ms == 0 || self.push_timeout_ms > MAX_PUSH_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "push_timeout_ms must be between 1 and {}",
                MAX_PUSH_TIMEOUT_MS
            )));
        }

        if matches!(&self.job, Some(job) if job.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "Job name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
