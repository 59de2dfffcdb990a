//! Observability module for metrics and logging.
//!
//! This module provides instrumentation for the pipeline, including
//! Prometheus metrics export and the tracing subscriber.

mod metrics;
mod tracing;

pub use self::metrics::{
    MetricsConfig, MetricsError, init_metrics, record_escalation, record_records, record_retry,
    record_stage_latency, record_unit_outcome,
};
pub use self::tracing::{LogFormat, TracingConfig, TracingError, build_filter, init_tracing};
