//! Extractor
//!
//! Pulls raw records for one unit from the quote source. Every call first
//! takes a token from the shared rate limiter, then runs under a per-call
//! timeout. Failures go through the decision engine until it says stop.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::retry_support::{cancelled, next_context, wait_or_cancel};
use crate::application::ports::{QuoteSourcePort, SourceError};
use crate::application::services::DecisionEngine;
use crate::domain::failure::{FailureContext, RetryDecision, Stage};
use crate::domain::market_data::RawRecord;
use crate::domain::work::UnitOfWork;
use crate::resilience::RateLimiter;

/// Extraction gave up on a unit.
#[derive(Debug, Clone, thiserror::Error)]
#[error("extraction failed for {}: {}", context.unit, context.summary())]
pub struct ExtractionError {
    /// Last failure context in the chain.
    pub context: FailureContext,
    /// Terminal decision (abort or escalate).
    pub decision: RetryDecision,
}

/// Extraction stage.
pub struct Extractor {
    source: Arc<dyn QuoteSourcePort>,
    limiter: Arc<RateLimiter>,
    engine: Arc<DecisionEngine>,
    call_timeout: Duration,
}

impl Extractor {
    /// Create a new extractor.
    #[must_use]
    pub fn new(
        source: Arc<dyn QuoteSourcePort>,
        limiter: Arc<RateLimiter>,
        engine: Arc<DecisionEngine>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            source,
            limiter,
            engine,
            call_timeout,
        }
    }

    /// Fetch all raw records for `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError`] once the decision engine aborts or
    /// escalates, or when `cancel` fires during a wait.
    pub async fn extract(
        &self,
        unit: &UnitOfWork,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, ExtractionError> {
        let mut previous: Option<FailureContext> = None;

        loop {
            let throttled = tokio::select! {
                biased;
                () = cancel.cancelled() => false,
                () = self.limiter.acquire() => true,
            };
            if !throttled {
                let (context, decision) = cancelled(Stage::Extract, unit, previous.as_ref());
                return Err(ExtractionError { context, decision });
            }

            let error = match self.fetch_once(unit).await {
                Ok(records) => {
                    if let Some(prev) = &previous {
                        tracing::info!(
                            unit = %unit,
                            retries = prev.attempt_count + 1,
                            records = records.len(),
                            "extraction recovered"
                        );
                    }
                    return Ok(records);
                }
                Err(e) => e,
            };

            let context = next_context(
                Stage::Extract,
                unit,
                previous.as_ref(),
                error.error_kind(),
                error.to_string(),
                error.retry_after(),
            );
            let decision = self.engine.decide(&context).await;
            if !decision.is_retry() {
                return Err(ExtractionError { context, decision });
            }

            tracing::warn!(
                unit = %unit,
                error = %error,
                attempt = context.attempt_count + 1,
                delay_ms = decision.wait.as_millis(),
                "extraction failed, retrying"
            );
            if !wait_or_cancel(decision.wait, cancel).await {
                let (context, decision) = cancelled(Stage::Extract, unit, Some(&context));
                return Err(ExtractionError { context, decision });
            }
            previous = Some(context);
        }
    }

    async fn fetch_once(&self, unit: &UnitOfWork) -> Result<Vec<RawRecord>, SourceError> {
        let call = self
            .source
            .fetch(unit.symbol(), unit.start_date(), unit.end_date());
        tokio::time::timeout(self.call_timeout, call)
            .await
            .unwrap_or(Err(SourceError::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone, Utc};
    use parking_lot::Mutex;
    use tokio::time::Instant;

    use super::*;
    use crate::application::services::ErrorClassifier;
    use crate::domain::failure::{DecisionCategory, ErrorKind, RetryAction};
    use crate::domain::shared::{DateRange, Symbol};
    use crate::resilience::{RateLimitConfig, RetryPolicy};

    /// Replays scripted results, then succeeds with one bar.
    struct ScriptedSource {
        script: Mutex<Vec<Result<Vec<RawRecord>, SourceError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedSource {
        fn new(mut script: Vec<Result<Vec<RawRecord>, SourceError>>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl QuoteSourcePort for ScriptedSource {
        async fn fetch(
            &self,
            symbol: &Symbol,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<RawRecord>, SourceError> {
            self.calls.lock().push(Instant::now());
            let next = self.script.lock().pop();
            next.unwrap_or_else(|| {
                let ts = Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap();
                Ok(vec![RawRecord::bar(symbol.as_str(), ts, 1.0, 1.0, 1.0, 1.0, 0.0)])
            })
        }
    }

    fn too_many_requests() -> Result<Vec<RawRecord>, SourceError> {
        Err(SourceError::Http {
            status: 429,
            retry_after: None,
            message: "Too Many Requests".to_string(),
        })
    }

    fn unit() -> UnitOfWork {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        UnitOfWork::new(Symbol::new("AAPL"), DateRange::new(day, day).unwrap())
    }

    fn extractor(source: Arc<ScriptedSource>, limiter: RateLimiter) -> Extractor {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            jitter_factor: 0.0,
            ..RetryPolicy::default()
        };
        Extractor::new(
            source,
            Arc::new(limiter),
            Arc::new(DecisionEngine::new(ErrorClassifier::heuristic_only(), policy)),
            Duration::from_secs(5),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn retries_rate_limits_with_exponential_waits() {
        let source = Arc::new(ScriptedSource::new(vec![
            too_many_requests(),
            too_many_requests(),
            too_many_requests(),
        ]));
        let extractor = extractor(Arc::clone(&source), RateLimiter::unlimited());

        let records = extractor.extract(&unit(), &CancellationToken::new()).await.unwrap();
        assert_eq!(records.len(), 1);

        let calls = source.calls.lock().clone();
        let gaps: Vec<_> = calls.windows(2).map(|w| w[1] - w[0]).collect();
        assert_eq!(gaps.len(), 3);
        for (gap, expected_secs) in gaps.iter().zip([1, 2, 4]) {
            let expected = Duration::from_secs(expected_secs);
            assert!(
                *gap >= expected && *gap <= expected + Duration::from_millis(10),
                "gap {gap:?}, expected {expected:?}"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn escalates_when_rate_limit_persists() {
        let source = Arc::new(ScriptedSource::new(vec![
            too_many_requests(),
            too_many_requests(),
            too_many_requests(),
            too_many_requests(),
        ]));
        let extractor = extractor(Arc::clone(&source), RateLimiter::unlimited());

        let err = extractor.extract(&unit(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.decision.action, RetryAction::Escalate);
        assert_eq!(err.decision.category, DecisionCategory::RateLimited);
        assert_eq!(err.context.attempt_count, 3);
        assert_eq!(source.calls.lock().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn decode_error_aborts_without_retry() {
        let source = Arc::new(ScriptedSource::new(vec![Err(SourceError::Decode {
            message: "missing chart".to_string(),
        })]));
        let extractor = extractor(Arc::clone(&source), RateLimiter::unlimited());

        let err = extractor.extract(&unit(), &CancellationToken::new()).await.unwrap_err();
        assert_eq!(err.decision.action, RetryAction::Abort);
        assert_eq!(source.calls.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn every_call_takes_a_limiter_token() {
        let source = Arc::new(ScriptedSource::new(vec![Err(SourceError::Network {
            message: "reset".to_string(),
        })]));
        let limiter = RateLimiter::new(RateLimitConfig {
            max_requests: 1,
            window: Duration::from_secs(120),
        });
        let extractor = extractor(Arc::clone(&source), limiter);

        let start = Instant::now();
        extractor.extract(&unit(), &CancellationToken::new()).await.unwrap();
        // The retry waited for the next token, not just the 60s linear step.
        assert!(start.elapsed() >= Duration::from_secs(120));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_retry_wait() {
        let source = Arc::new(ScriptedSource::new(vec![too_many_requests()]));
        let extractor = extractor(Arc::clone(&source), RateLimiter::unlimited());
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = extractor.extract(&unit(), &cancel).await.unwrap_err();
        assert_eq!(err.context.error_kind, ErrorKind::Cancelled);
        assert_eq!(err.decision.action, RetryAction::Abort);
        assert_eq!(source.calls.lock().len(), 1);
    }
}
