//! Loader
//!
//! Persists one unit's canonical records as a single atomic upsert. A
//! timed-out attempt either committed fully or rolled back fully, so the
//! retry loop may re-run it safely.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::retry_support::{cancelled, next_context, wait_or_cancel};
use crate::application::ports::{LoadResult, RecordStorePort, StoreError};
use crate::application::services::DecisionEngine;
use crate::domain::failure::{ErrorKind, FailureContext, RetryDecision, Stage};
use crate::domain::market_data::CanonicalRecord;
use crate::domain::work::UnitOfWork;

/// Load gave up on a unit.
#[derive(Debug, Clone, thiserror::Error)]
#[error("load failed for {}: {}", context.unit, context.summary())]
pub struct LoadError {
    /// Last failure context in the chain.
    pub context: FailureContext,
    /// Terminal decision (abort or escalate).
    pub decision: RetryDecision,
}

/// Load stage.
pub struct Loader {
    store: Arc<dyn RecordStorePort>,
    engine: Arc<DecisionEngine>,
    call_timeout: Duration,
}

impl Loader {
    /// Create a new loader.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStorePort>, engine: Arc<DecisionEngine>, call_timeout: Duration) -> Self {
        Self {
            store,
            engine,
            call_timeout,
        }
    }

    /// Upsert `records` for `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError`] once the decision engine aborts or escalates,
    /// or when `cancel` fires during a wait. Nothing from this batch is
    /// persisted in that case.
    pub async fn load(
        &self,
        unit: &UnitOfWork,
        records: &[CanonicalRecord],
        cancel: &CancellationToken,
    ) -> Result<LoadResult, LoadError> {
        if records.is_empty() {
            return Ok(LoadResult::default());
        }

        let mut previous: Option<FailureContext> = None;

        loop {
            let (kind, message) = match self.upsert_once(records).await {
                Ok(result) => {
                    tracing::debug!(
                        unit = %unit,
                        rows = result.total(),
                        inserted = result.inserted,
                        updated = result.updated,
                        "batch committed"
                    );
                    return Ok(result);
                }
                Err(None) => (
                    ErrorKind::Timeout,
                    format!("upsert exceeded {}ms", self.call_timeout.as_millis()),
                ),
                Err(Some(e)) => (e.error_kind(), e.to_string()),
            };

            let context = next_context(Stage::Load, unit, previous.as_ref(), kind, message, None);
            let decision = self.engine.decide(&context).await;
            if !decision.is_retry() {
                return Err(LoadError { context, decision });
            }

            tracing::warn!(
                unit = %unit,
                error = %context.message,
                attempt = context.attempt_count + 1,
                delay_ms = decision.wait.as_millis(),
                "load failed, retrying"
            );
            if !wait_or_cancel(decision.wait, cancel).await {
                let (context, decision) = cancelled(Stage::Load, unit, Some(&context));
                return Err(LoadError { context, decision });
            }
            previous = Some(context);
        }
    }

    /// One bounded attempt. `Err(None)` means the deadline passed.
    async fn upsert_once(&self, records: &[CanonicalRecord]) -> Result<LoadResult, Option<StoreError>> {
        match tokio::time::timeout(self.call_timeout, self.store.upsert_batch(records)).await {
            Ok(result) => result.map_err(Some),
            Err(_) => Err(None),
        }
    }
}
