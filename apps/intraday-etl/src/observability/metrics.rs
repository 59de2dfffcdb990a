//! Prometheus metrics for the ETL pipeline.
//!
//! Recording functions are no-ops until a recorder is installed, so library
//! code calls them unconditionally.
//!
//! # Example
//!
//! ```ignore
//! use intraday_etl::observability::{init_metrics, MetricsConfig};
//!
//! init_metrics(&MetricsConfig::with_addr("0.0.0.0:9090".parse()?))?;
//! record_unit_outcome("succeeded");
//! ```

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::{Ipv4Addr, SocketAddr};

/// Configuration for the metrics exporter.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP listener.
    pub listen_addr: SocketAddr,
    /// Histogram buckets for stage latency (in seconds).
    pub latency_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 9090)),
            // Stage latency from 10ms to 10 minutes; retries dominate the tail
            latency_buckets: vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 180.0, 600.0],
        }
    }
}

impl MetricsConfig {
    /// Create a new metrics configuration with custom address.
    #[must_use]
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            listen_addr: addr,
            ..Default::default()
        }
    }
}

/// Initialize the Prometheus metrics exporter.
///
/// This starts an HTTP server that exposes metrics at `/metrics`.
///
/// # Errors
///
/// Returns an error if the metrics exporter fails to start (e.g., port already in use).
pub fn init_metrics(config: &MetricsConfig) -> Result<(), MetricsError> {
    PrometheusBuilder::new()
        .with_http_listener(config.listen_addr)
        .set_buckets(&config.latency_buckets)
        .map_err(|e| MetricsError::Configuration(e.to_string()))?
        .install()
        .map_err(|e| MetricsError::Installation(e.to_string()))?;

    tracing::info!(
        addr = %config.listen_addr,
        "Prometheus metrics exporter started"
    );

    Ok(())
}

/// Error type for metrics operations.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Failed to configure metrics exporter.
    #[error("metrics configuration error: {0}")]
    Configuration(String),
    /// Failed to install metrics exporter.
    #[error("metrics installation error: {0}")]
    Installation(String),
}

/// Record the terminal status of a unit (`succeeded`, `failed`, `skipped`).
pub fn record_unit_outcome(status: &str) {
    counter!("etl_units_total", "status" => status.to_string()).increment(1);
}

/// Record a retry scheduled by the decision engine.
pub fn record_retry(stage: &str, category: &str) {
    counter!(
        "etl_retries_total",
        "stage" => stage.to_string(),
        "category" => category.to_string()
    )
    .increment(1);
}

/// Record record counts by outcome (`extracted`, `rejected`, `inserted`, `updated`).
pub fn record_records(outcome: &str, count: u64) {
    if count > 0 {
        counter!("etl_records_total", "outcome" => outcome.to_string()).increment(count);
    }
}

/// Record an escalation.
pub fn record_escalation(category: &str) {
    counter!("etl_escalations_total", "category" => category.to_string()).increment(1);
}

/// Record wall time spent in a stage, retries included.
pub fn record_stage_latency(stage: &str, latency_seconds: f64) {
    histogram!("etl_stage_latency_seconds", "stage" => stage.to_string()).record(latency_seconds);
}
