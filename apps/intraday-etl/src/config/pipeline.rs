//! Orchestrator settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::use_cases::{PauseScope, PipelineConfig};

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Concurrent units.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Fail a unit when more than this fraction of its records is rejected.
    #[serde(default)]
    pub rejection_threshold: Option<f64>,
    /// Whether a connectivity escalation pauses only this run or all later ones.
    #[serde(default)]
    pub escalation_pause: PauseScope,
    /// Deadline for one load call.
    #[serde(default = "default_load_timeout")]
    pub load_timeout_secs: u64,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            rejection_threshold: None,
            escalation_pause: PauseScope::default(),
            load_timeout_secs: default_load_timeout(),
        }
    }
}

impl PipelineSettings {
    /// Orchestrator settings.
    #[must_use]
    pub const fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            rejection_threshold: self.rejection_threshold,
            escalation_pause: self.escalation_pause,
        }
    }

    /// Per-call load deadline.
    #[must_use]
    pub const fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

const fn default_workers() -> usize {
    4
}

const fn default_load_timeout() -> u64 {
    30
}
