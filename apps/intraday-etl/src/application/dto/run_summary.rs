//! Run summary handed to the notifier at the end of every run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit that ended `failed` in this run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFailureDto {
    /// Unit key, formatted.
    pub unit_key: String,
    /// Stage-level error summary.
    pub error_summary: String,
}

/// Aggregated outcome of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Run identifier.
    pub run_id: Uuid,
    /// Run start.
    pub started_at: DateTime<Utc>,
    /// Run end.
    pub finished_at: DateTime<Utc>,
    /// Units produced by the work list.
    pub units_planned: usize,
    /// Units committed in this run.
    pub succeeded: usize,
    /// Units that ended failed.
    pub failed: usize,
    /// Units skipped because an earlier run already committed them.
    pub skipped_completed: usize,
    /// Units left pending by a halt, a pause or cancellation.
    pub not_dispatched: usize,
    /// Raw records pulled from the source.
    pub records_extracted: u64,
    /// Rows inserted.
    pub inserted: u64,
    /// Rows overwritten.
    pub updated: u64,
    /// Raw records rejected by validation.
    pub rejected: u64,
    /// Escalations raised.
    pub escalations: usize,
    /// Dispatch stopped because of a connectivity escalation.
    pub halted: bool,
    /// Dispatch refused because a persistent pause was set.
    pub paused: bool,
    /// The run was cancelled.
    pub cancelled: bool,
    /// Per-unit failures.
    pub failures: Vec<UnitFailureDto>,
}

impl RunSummary {
    /// Empty summary for a run starting now.
    #[must_use]
    pub fn start(run_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            units_planned: 0,
            succeeded: 0,
            failed: 0,
            skipped_completed: 0,
            not_dispatched: 0,
            records_extracted: 0,
            inserted: 0,
            updated: 0,
            rejected: 0,
            escalations: 0,
            halted: false,
            paused: false,
            cancelled: false,
            failures: Vec::new(),
        }
    }

    /// Whether every planned unit is now committed.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.failed == 0 && self.not_dispatched == 0 && !self.halted && !self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_summary_is_complete() {
        let summary = RunSummary::start(Uuid::new_v4(), Utc::now());
        assert!(summary.is_complete());
    }

    #[test]
    fn halted_summary_is_not_complete() {
        let mut summary = RunSummary::start(Uuid::new_v4(), Utc::now());
        summary.halted = true;
        assert!(!summary.is_complete());
    }
}
