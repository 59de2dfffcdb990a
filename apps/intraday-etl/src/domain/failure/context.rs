//! Failure context passed between stages, the classifier and the policy.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::work::UnitOfWork;

/// Pipeline stage where a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Pulling raw records from the quote source.
    Extract,
    /// Validating and normalizing records.
    Transform,
    /// Persisting canonical records.
    Load,
}

impl Stage {
    /// Lowercase name, used in logs, metrics labels and storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Extract => "extract",
            Self::Transform => "transform",
            Self::Load => "load",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse shape of the underlying error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Non-success HTTP status from the quote source.
    HttpStatus(u16),
    /// An external call exceeded its deadline.
    Timeout,
    /// Connection reset, DNS failure and similar transport errors.
    Network,
    /// Response body could not be interpreted.
    MalformedData,
    /// The database could not be reached or the pool is exhausted.
    DbConnection,
    /// The database rejected a statement.
    DbQuery,
    /// The run was cancelled.
    Cancelled,
    /// Anything else.
    Other,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HttpStatus(status) => write!(f, "http_{status}"),
            Self::Timeout => f.write_str("timeout"),
            Self::Network => f.write_str("network"),
            Self::MalformedData => f.write_str("malformed_data"),
            Self::DbConnection => f.write_str("db_connection"),
            Self::DbQuery => f.write_str("db_query"),
            Self::Cancelled => f.write_str("cancelled"),
            Self::Other => f.write_str("other"),
        }
    }
}

/// Snapshot of a failed attempt.
///
/// Never mutated. Each retry produces a successor through [`FailureContext::next`],
/// so a chain of contexts is the attempt history of one failure site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Stage that failed.
    pub stage: Stage,
    /// Shape of the error.
    pub error_kind: ErrorKind,
    /// Human-readable error message.
    pub message: String,
    /// Unit being processed.
    pub unit: UnitOfWork,
    /// Retries already performed for this failure site.
    pub attempt_count: u32,
    /// Server-provided minimum wait (e.g. `Retry-After`).
    pub retry_after_hint: Option<Duration>,
}

impl FailureContext {
    /// First failure at a site.
    #[must_use]
    pub fn new(
        stage: Stage,
        error_kind: ErrorKind,
        message: impl Into<String>,
        unit: UnitOfWork,
    ) -> Self {
        Self {
            stage,
            error_kind,
            message: message.into(),
            unit,
            attempt_count: 0,
            retry_after_hint: None,
        }
    }

    /// Attach a server-provided wait hint.
    #[must_use]
    pub const fn with_retry_after(mut self, hint: Option<Duration>) -> Self {
        self.retry_after_hint = hint;
        self
    }

    /// Successor context for the failure of the next attempt.
    ///
    /// Stage and unit are carried over; the attempt counter goes up by one.
    #[must_use]
    pub fn next(
        &self,
        error_kind: ErrorKind,
        message: impl Into<String>,
        retry_after_hint: Option<Duration>,
    ) -> Self {
        Self {
            stage: self.stage,
            error_kind,
            message: message.into(),
            unit: self.unit.clone(),
            attempt_count: self.attempt_count.saturating_add(1),
            retry_after_hint,
        }
    }

    /// One-line description for checkpoints and notifications.
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "{} failed after {} retries ({}): {}",
            self.stage, self.attempt_count, self.error_kind, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::shared::{DateRange, Symbol};

    fn unit() -> UnitOfWork {
        let day = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        UnitOfWork::new(Symbol::new("MSFT"), DateRange::new(day, day).unwrap())
    }

    #[test]
    fn next_increments_attempt_and_keeps_origin() {
        let first = FailureContext::new(Stage::Extract, ErrorKind::HttpStatus(429), "slow down", unit())
            .with_retry_after(Some(Duration::from_secs(5)));
        let second = first.next(ErrorKind::Timeout, "timed out", None);

        assert_eq!(first.attempt_count, 0);
        assert_eq!(first.retry_after_hint, Some(Duration::from_secs(5)));
        assert_eq!(second.attempt_count, 1);
        assert_eq!(second.stage, Stage::Extract);
        assert_eq!(second.unit, first.unit);
        assert_eq!(second.error_kind, ErrorKind::Timeout);
        assert_eq!(second.retry_after_hint, None);
    }

    #[test]
    fn summary_mentions_stage_and_kind() {
        let ctx = FailureContext::new(Stage::Load, ErrorKind::DbConnection, "refused", unit());
        let summary = ctx.next(ErrorKind::DbConnection, "refused", None).summary();
        assert_eq!(summary, "load failed after 1 retries (db_connection): refused");
    }
}
