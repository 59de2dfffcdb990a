//! Durable per-unit pipeline status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{CheckpointStateMachine, UnitKey};
use crate::domain::shared::DomainError;

/// Lifecycle status of a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// Enqueued, not started.
    Pending,
    /// Extraction has started.
    InProgress,
    /// Loaded and committed.
    Succeeded,
    /// Gave up for this run.
    Failed,
}

impl CheckpointStatus {
    /// Storage representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are allowed within a run.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for CheckpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CheckpointStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::InvalidValue {
                field: "checkpoint_status".to_string(),
                message: format!("unknown status '{other}'"),
            }),
        }
    }
}

/// Durable record of a unit's status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Unit identity.
    pub key: UnitKey,
    /// Current status.
    pub status: CheckpointStatus,
    /// When the status last changed because of processing.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// Failure description for `failed` units.
    pub error_summary: Option<String>,
    /// Processing attempts across runs.
    pub attempts: u32,
}

impl Checkpoint {
    /// A freshly enqueued unit.
    #[must_use]
    pub const fn pending(key: UnitKey, attempts: u32) -> Self {
        Self {
            key,
            status: CheckpointStatus::Pending,
            last_attempt_at: None,
            error_summary: None,
            attempts,
        }
    }

    /// Move to `in_progress`.
    pub fn start(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(CheckpointStatus::InProgress, at)?;
        self.attempts = self.attempts.saturating_add(1);
        Ok(())
    }

    /// Move to `succeeded`.
    pub fn succeed(&mut self, at: DateTime<Utc>) -> Result<(), DomainError> {
        self.transition(CheckpointStatus::Succeeded, at)?;
        self.error_summary = None;
        Ok(())
    }

    /// Move to `failed` with a summary of what went wrong.
    pub fn fail(&mut self, at: DateTime<Utc>, summary: impl Into<String>) -> Result<(), DomainError> {
        self.transition(CheckpointStatus::Failed, at)?;
        self.error_summary = Some(summary.into());
        Ok(())
    }

    fn transition(&mut self, to: CheckpointStatus, at: DateTime<Utc>) -> Result<(), DomainError> {
        CheckpointStateMachine::validate_transition(self.status, to)?;
        self.status = to;
        self.last_attempt_at = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::shared::{DateRange, Symbol};

    fn checkpoint() -> Checkpoint {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
        )
        .unwrap();
        Checkpoint::pending(UnitKey::new(Symbol::new("SPY"), range), 0)
    }

    #[test]
    fn happy_path_lifecycle() {
        let mut cp = checkpoint();
        let now = Utc::now();
        cp.start(now).unwrap();
        assert_eq!(cp.status, CheckpointStatus::InProgress);
        assert_eq!(cp.attempts, 1);
        cp.succeed(now).unwrap();
        assert_eq!(cp.status, CheckpointStatus::Succeeded);
        assert_eq!(cp.last_attempt_at, Some(now));
    }

    #[test]
    fn failed_records_summary() {
        let mut cp = checkpoint();
        cp.start(Utc::now()).unwrap();
        cp.fail(Utc::now(), "load: connection refused").unwrap();
        assert_eq!(cp.status, CheckpointStatus::Failed);
        assert_eq!(cp.error_summary.as_deref(), Some("load: connection refused"));
    }

    #[test]
    fn terminal_status_never_regresses() {
        let mut cp = checkpoint();
        cp.start(Utc::now()).unwrap();
        cp.succeed(Utc::now()).unwrap();
        assert!(cp.start(Utc::now()).is_err());
        assert!(cp.fail(Utc::now(), "late").is_err());
        assert_eq!(cp.status, CheckpointStatus::Succeeded);
    }

    #[test]
    fn pending_cannot_skip_to_succeeded() {
        let mut cp = checkpoint();
        assert!(cp.succeed(Utc::now()).is_err());
        assert!(cp.fail(Utc::now(), "never started").is_err());
        assert_eq!(cp.status, CheckpointStatus::Pending);
    }

    #[test]
    fn status_parses_storage_form() {
        for status in [
            CheckpointStatus::Pending,
            CheckpointStatus::InProgress,
            CheckpointStatus::Succeeded,
            CheckpointStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<CheckpointStatus>().unwrap(), status);
        }
        assert!("done".parse::<CheckpointStatus>().is_err());
    }
}
