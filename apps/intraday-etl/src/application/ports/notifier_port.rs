//! Notifier Port (Driven Port)
//!
//! Alerting channel for escalations and run summaries. Delivery failures are
//! logged by callers and never fail a run.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::dto::RunSummary;
use crate::domain::failure::{DecisionCategory, Stage};

/// Notification delivery error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    /// Channel rejected or failed to deliver the message.
    #[error("Notification delivery failed: {message}")]
    Delivery {
        /// Error details.
        message: String,
    },
}

/// A unit gave up with an escalate decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationNotice {
    /// Run that escalated.
    pub run_id: Uuid,
    /// Unit key, formatted.
    pub unit_key: String,
    /// Stage that failed.
    pub stage: Stage,
    /// Failure category.
    pub category: DecisionCategory,
    /// Retries performed.
    pub attempt_count: u32,
    /// Last error message.
    pub message: String,
    /// Whether the escalation stopped further dispatch.
    pub halts_run: bool,
}

/// Message sent through the alerting channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Retries exhausted for a unit.
    Escalation(EscalationNotice),
    /// A run finished.
    RunCompleted(RunSummary),
}

impl Notification {
    /// Short subject line.
    #[must_use]
    pub fn subject(&self) -> String {
        match self {
            Self::Escalation(notice) if notice.halts_run => {
                format!("[intraday-etl] run halted: {} ({})", notice.unit_key, notice.category)
            }
            Self::Escalation(notice) => {
                format!("[intraday-etl] escalation: {} ({})", notice.unit_key, notice.category)
            }
            Self::RunCompleted(summary) => format!(
                "[intraday-etl] run {} finished: {} succeeded, {} failed",
                summary.run_id, summary.succeeded, summary.failed
            ),
        }
    }
}

/// Port for alerting.
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver a notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// No-op notifier for testing.
#[derive(Debug, Clone, Default)]
pub struct NoOpNotifier;

#[async_trait]
impl NotifierPort for NoOpNotifier {
    async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn notice(halts_run: bool) -> EscalationNotice {
        EscalationNotice {
            run_id: Uuid::nil(),
            unit_key: "AAPL:2024-01-01..2024-01-07".to_string(),
            stage: Stage::Load,
            category: DecisionCategory::ConnectivityLost,
            attempt_count: 3,
            message: "connection refused".to_string(),
            halts_run,
        }
    }

    #[test]
    fn subject_marks_halting_escalations() {
        let subject = Notification::Escalation(notice(true)).subject();
        assert!(subject.contains("run halted"));
        assert!(subject.contains("connectivity_lost"));

        let subject = Notification::Escalation(notice(false)).subject();
        assert!(subject.contains("escalation"));
    }

    #[test]
    fn serializes_with_type_tag() {
        let summary = RunSummary::start(Uuid::nil(), Utc::now());
        let json = serde_json::to_value(Notification::RunCompleted(summary)).unwrap();
        assert_eq!(json["type"], "run_completed");
        assert_eq!(json["succeeded"], 0);
    }

    #[tokio::test]
    async fn no_op_notifier_succeeds() {
        let result = NoOpNotifier.notify(&Notification::Escalation(notice(false))).await;
        assert!(result.is_ok());
    }
}
