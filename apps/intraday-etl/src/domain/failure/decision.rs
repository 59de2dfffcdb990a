//! Retry decisions and their audit trail.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Stage;
use crate::domain::work::UnitKey;

/// Failure category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    /// Likely to succeed on a plain retry.
    Transient,
    /// The quote source is throttling us.
    RateLimited,
    /// The input itself is bad; retrying cannot help.
    DataInvalid,
    /// The store is unreachable.
    ConnectivityLost,
    /// Nothing matched.
    Unknown,
}

impl DecisionCategory {
    /// All categories, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::Transient,
        Self::RateLimited,
        Self::DataInvalid,
        Self::ConnectivityLost,
        Self::Unknown,
    ];

    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::RateLimited => "rate_limited",
            Self::DataInvalid => "data_invalid",
            Self::ConnectivityLost => "connectivity_lost",
            Self::Unknown => "unknown",
        }
    }

    /// Parse a loosely formatted label (case, spaces and dashes ignored).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect();
        Self::ALL.into_iter().find(|c| c.as_str() == normalized)
    }
}

impl fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
    /// Wait, then try the same call again.
    Retry,
    /// Give up on the unit and raise an alert.
    Escalate,
    /// Give up on the unit quietly.
    Abort,
}

impl RetryAction {
    /// Snake-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Retry => "retry",
            Self::Escalate => "escalate",
            Self::Abort => "abort",
        }
    }
}

impl fmt::Display for RetryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryDecision {
    /// Chosen action.
    pub action: RetryAction,
    /// How long to wait before retrying; zero unless `action` is retry.
    pub wait: Duration,
    /// Category the decision was based on.
    pub category: DecisionCategory,
}

impl RetryDecision {
    /// Retry after `wait`.
    #[must_use]
    pub const fn retry(category: DecisionCategory, wait: Duration) -> Self {
        Self {
            action: RetryAction::Retry,
            wait,
            category,
        }
    }

    /// Escalate without waiting.
    #[must_use]
    pub const fn escalate(category: DecisionCategory) -> Self {
        Self {
            action: RetryAction::Escalate,
            wait: Duration::ZERO,
            category,
        }
    }

    /// Abort without waiting.
    #[must_use]
    pub const fn abort(category: DecisionCategory) -> Self {
        Self {
            action: RetryAction::Abort,
            wait: Duration::ZERO,
            category,
        }
    }

    /// Whether the caller should try again.
    #[must_use]
    pub const fn is_retry(&self) -> bool {
        matches!(self.action, RetryAction::Retry)
    }
}

/// Audit record of a terminal decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionLogEntry {
    /// Run that made the decision.
    pub run_id: Uuid,
    /// Unit the decision applied to.
    pub unit_key: UnitKey,
    /// Stage that failed.
    pub stage: Stage,
    /// Assigned category.
    pub category: DecisionCategory,
    /// Chosen action.
    pub action: RetryAction,
    /// Retries performed before the decision.
    pub attempt_count: u32,
    /// Failure message.
    pub reason: String,
    /// When the decision was made.
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_label_tolerates_formatting() {
        assert_eq!(
            DecisionCategory::from_label("  Rate-Limited\n"),
            Some(DecisionCategory::RateLimited)
        );
        assert_eq!(
            DecisionCategory::from_label("connectivity lost"),
            Some(DecisionCategory::ConnectivityLost)
        );
        assert_eq!(DecisionCategory::from_label("retry please"), None);
    }

    #[test]
    fn only_retry_carries_wait() {
        let retry = RetryDecision::retry(DecisionCategory::Transient, Duration::from_secs(3));
        assert!(retry.is_retry());
        assert_eq!(retry.wait, Duration::from_secs(3));

        let escalate = RetryDecision::escalate(DecisionCategory::RateLimited);
        assert!(!escalate.is_retry());
        assert_eq!(escalate.wait, Duration::ZERO);
    }
}
