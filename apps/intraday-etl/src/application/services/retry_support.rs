//! Helpers shared by the extractor and loader retry loops.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::failure::{DecisionCategory, ErrorKind, FailureContext, RetryDecision, Stage};
use crate::domain::work::UnitOfWork;

/// Sleep for `wait` unless the run is cancelled first.
///
/// Returns `false` when cancelled.
pub(crate) async fn wait_or_cancel(wait: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        () = tokio::time::sleep(wait) => true,
    }
}

/// Context and decision for a unit interrupted by cancellation.
pub(crate) fn cancelled(
    stage: Stage,
    unit: &UnitOfWork,
    previous: Option<&FailureContext>,
) -> (FailureContext, RetryDecision) {
    const MESSAGE: &str = "run cancelled";
    let context = previous.map_or_else(
        || FailureContext::new(stage, ErrorKind::Cancelled, MESSAGE, unit.clone()),
        |prev| prev.next(ErrorKind::Cancelled, MESSAGE, None),
    );
    (context, RetryDecision::abort(DecisionCategory::Unknown))
}

/// First context for a failure site, or the successor of the previous one.
pub(crate) fn next_context(
    stage: Stage,
    unit: &UnitOfWork,
    previous: Option<&FailureContext>,
    kind: ErrorKind,
    message: String,
    retry_after: Option<Duration>,
) -> FailureContext {
    match previous {
        None => FailureContext::new(stage, kind, message, unit.clone()).with_retry_after(retry_after),
        Some(prev) => prev.next(kind, message, retry_after),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::domain::failure::RetryAction;
    use crate::domain::shared::{DateRange, Symbol};

    fn unit() -> UnitOfWork {
        let day = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        UnitOfWork::new(Symbol::new("QQQ"), DateRange::new(day, day).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn wait_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(wait_or_cancel(Duration::from_secs(30), &cancel).await);
    }

    #[tokio::test]
    async fn wait_returns_early_on_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!wait_or_cancel(Duration::from_secs(3600), &cancel).await);
    }

    #[test]
    fn cancelled_continues_the_chain() {
        let first = next_context(Stage::Load, &unit(), None, ErrorKind::DbConnection, "down".into(), None);
        let (context, decision) = cancelled(Stage::Load, &unit(), Some(&first));
        assert_eq!(context.attempt_count, 1);
        assert_eq!(context.error_kind, ErrorKind::Cancelled);
        assert_eq!(decision.action, RetryAction::Abort);
    }
}
