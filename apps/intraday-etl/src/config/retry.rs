//! Retry policy settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::resilience::RetryPolicy;

/// Retry configuration. Delays are in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries before escalating.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// First exponential delay.
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,
    /// Upper bound for any wait.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Jitter applied to exponential delays (0.0 to 1.0).
    #[serde(default = "default_jitter")]
    pub jitter_factor: f64,
    /// Step of the linear schedule used for transient and unknown failures.
    #[serde(default = "default_linear_step")]
    pub linear_step_ms: u64,
    /// Fixed wait between database reconnect attempts.
    #[serde(default = "default_db_retry_delay")]
    pub db_retry_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            jitter_factor: default_jitter(),
            linear_step_ms: default_linear_step(),
            db_retry_delay_ms: default_db_retry_delay(),
        }
    }
}

impl RetryConfig {
    /// Build the policy.
    #[must_use]
    pub const fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter_factor: self.jitter_factor,
            linear_step: Duration::from_millis(self.linear_step_ms),
            fixed_db_retry_delay: Duration::from_millis(self.db_retry_delay_ms),
        }
    }
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_base_delay() -> u64 {
    10_000
}

const fn default_max_delay() -> u64 {
    300_000
}

const fn default_jitter() -> f64 {
    0.2
}

const fn default_linear_step() -> u64 {
    60_000
}

const fn default_db_retry_delay() -> u64 {
    10_000
}
