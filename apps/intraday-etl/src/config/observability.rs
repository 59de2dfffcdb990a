//! Observability configuration for logging and metrics.

use std::net::{Ipv4Addr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::observability::{LogFormat, MetricsConfig, TracingConfig};

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Prometheus listener port; 0 disables the exporter.
    #[serde(default)]
    pub metrics_port: u16,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl ObservabilityConfig {
    /// Subscriber settings.
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            level: self.logging.level.clone(),
            format: self.logging.format,
        }
    }

    /// Exporter settings, or `None` when disabled.
    #[must_use]
    pub fn metrics_config(&self) -> Option<MetricsConfig> {
        (self.metrics_port > 0).then(|| MetricsConfig {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.metrics_port)),
            ..MetricsConfig::default()
        })
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
