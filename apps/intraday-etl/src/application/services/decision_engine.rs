//! Decision Engine
//!
//! Classifier plus retry policy: the single `decide` entry point used by the
//! extractor and the loader.

use crate::application::services::ErrorClassifier;
use crate::domain::failure::{FailureContext, RetryAction, RetryDecision};
use crate::observability::record_retry;
use crate::resilience::RetryPolicy;

/// Turns a failure into a retry decision.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    classifier: ErrorClassifier,
    policy: RetryPolicy,
}

impl DecisionEngine {
    /// Create a new engine.
    #[must_use]
    pub const fn new(classifier: ErrorClassifier, policy: RetryPolicy) -> Self {
        Self { classifier, policy }
    }

    /// The retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Classify the failure and decide what to do next.
    pub async fn decide(&self, context: &FailureContext) -> RetryDecision {
        let category = self.classifier.classify(context).await;
        let decision = self.policy.decide(context, category);

        match decision.action {
            RetryAction::Retry => {
                record_retry(context.stage.as_str(), category.as_str());
                tracing::debug!(
                    unit = %context.unit,
                    stage = %context.stage,
                    attempt = context.attempt_count,
                    category = %category,
                    delay_ms = decision.wait.as_millis(),
                    error = %context.message,
                    "retry scheduled"
                );
            }
            RetryAction::Escalate | RetryAction::Abort => {
                tracing::warn!(
                    unit = %context.unit,
                    stage = %context.stage,
                    attempt = context.attempt_count,
                    category = %category,
                    action = %decision.action,
                    error = %context.message,
                    "giving up on failure site"
                );
            }
        }

        decision
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::failure::{DecisionCategory, ErrorKind, Stage};
    use crate::domain::shared::{DateRange, Symbol};
    use crate::domain::work::UnitOfWork;

    fn engine() -> DecisionEngine {
        DecisionEngine::new(
            ErrorClassifier::heuristic_only(),
            RetryPolicy {
                max_retries: 2,
                jitter_factor: 0.0,
                base_delay: Duration::from_secs(1),
                ..RetryPolicy::default()
            },
        )
    }

    fn context(kind: ErrorKind) -> FailureContext {
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let unit = UnitOfWork::new(Symbol::new("AMD"), DateRange::new(day, day).unwrap());
        FailureContext::new(Stage::Extract, kind, "fail", unit)
    }

    #[tokio::test]
    async fn rate_limit_chain_retries_then_escalates() {
        let engine = engine();
        let first = context(ErrorKind::HttpStatus(429));
        let second = first.next(ErrorKind::HttpStatus(429), "fail", None);
        let third = second.next(ErrorKind::HttpStatus(429), "fail", None);

        assert_eq!(engine.decide(&first).await.wait, Duration::from_secs(1));
        assert_eq!(engine.decide(&second).await.wait, Duration::from_secs(2));

        let last = engine.decide(&third).await;
        assert_eq!(last.action, RetryAction::Escalate);
        assert_eq!(last.category, DecisionCategory::RateLimited);
    }

    #[tokio::test]
    async fn malformed_data_aborts() {
        let decision = engine().decide(&context(ErrorKind::MalformedData)).await;
        assert_eq!(decision.action, RetryAction::Abort);
        assert_eq!(decision.category, DecisionCategory::DataInvalid);
    }
}
