//! Run Pipeline Use Case
//!
//! Drives every unit through extract, transform and load on a bounded worker
//! pool, keeping checkpoints current and escalating when retries run out.
//!
//! # Unit lifecycle
//!
//! ```text
//! pending -> in_progress -> succeeded
//!                        -> failed
//! ```
//!
//! Units already `succeeded` in an earlier run are skipped. A
//! `connectivity_lost` escalation stops dispatch for the rest of the run;
//! units not yet started stay `pending`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures::StreamExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::application::dto::{RunSummary, UnitFailureDto};
use crate::application::ports::{
    CheckpointStorePort, DecisionLogPort, EscalationNotice, Notification, NotifierPort, StoreError,
};
use crate::application::services::{Extractor, Loader, Transformer};
use crate::domain::failure::{
    DecisionCategory, DecisionLogEntry, ErrorKind, FailureContext, RetryAction, RetryDecision,
    Stage,
};
use crate::domain::shared::DomainError;
use crate::domain::work::{Checkpoint, CheckpointStatus, PauseRecord, UnitKey, UnitOfWork};
use crate::observability::{record_escalation, record_records, record_stage_latency, record_unit_outcome};

/// How long a connectivity escalation keeps the pipeline paused.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseScope {
    /// Only the current run stops dispatching.
    #[default]
    Run,
    /// Later runs refuse to dispatch until the pause is cleared.
    Persistent,
}

/// Orchestrator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Units processed concurrently.
    pub workers: usize,
    /// Fail a unit before load when more than this share of its records is
    /// rejected. `None` never fails a unit for rejections.
    pub rejection_threshold: Option<f64>,
    /// Scope of the connectivity pause.
    pub escalation_pause: PauseScope,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            rejection_threshold: None,
            escalation_pause: PauseScope::Run,
        }
    }
}

/// Pipeline error.
///
/// Unit failures are reported in the [`RunSummary`]; only problems that
/// prevent the run from starting surface here.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Checkpoints or the pause flag could not be read or written.
    #[error("checkpoint store unavailable: {0}")]
    CheckpointStore(#[from] StoreError),

    /// A checkpoint transition was rejected.
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Mutable state shared by the workers of one run.
struct RunState {
    run_id: Uuid,
    halted: AtomicBool,
    summary: Mutex<RunSummary>,
}

/// Use case running one pass of the pipeline.
pub struct RunPipelineUseCase {
    extractor: Extractor,
    transformer: Transformer,
    loader: Loader,
    checkpoints: Arc<dyn CheckpointStorePort>,
    decision_log: Arc<dyn DecisionLogPort>,
    notifier: Arc<dyn NotifierPort>,
    config: PipelineConfig,
}

impl RunPipelineUseCase {
    /// Create a new `RunPipelineUseCase`.
    #[must_use]
    pub fn new(
        extractor: Extractor,
        transformer: Transformer,
        loader: Loader,
        checkpoints: Arc<dyn CheckpointStorePort>,
        decision_log: Arc<dyn DecisionLogPort>,
        notifier: Arc<dyn NotifierPort>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            extractor,
            transformer,
            loader,
            checkpoints,
            decision_log,
            notifier,
            config,
        }
    }

    /// Remove a persistent pause. Returns whether one was set.
    ///
    /// # Errors
    ///
    /// Returns an error if the checkpoint store is unavailable.
    pub async fn clear_pause(&self) -> Result<bool, PipelineError> {
        let cleared = self.checkpoints.clear_pause().await?;
        if cleared {
            tracing::info!("persistent pause cleared");
        }
        Ok(cleared)
    }

    /// Run the pipeline over `units`.
    ///
    /// # Errors
    ///
    /// Returns an error if checkpoints cannot be read or the initial
    /// `pending` checkpoints cannot be written.
    pub async fn execute(
        &self,
        units: Vec<UnitOfWork>,
        cancel: CancellationToken,
    ) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::start(run_id, Utc::now());
        summary.units_planned = units.len();

        tracing::info!(run_id = %run_id, units = units.len(), workers = self.config.workers, "pipeline run starting");

        // A pause written by an earlier persistent-scope run holds regardless of the current scope.
        if let Some(pause) = self.checkpoints.load_pause().await? {
            tracing::error!(
                paused_at = %pause.paused_at,
                paused_by = %pause.run_id,
                reason = %pause.reason,
                "pipeline is paused, nothing dispatched"
            );
            summary.paused = true;
            summary.not_dispatched = units.len();
            return Ok(self.finish(summary).await);
        }

        let queue = self.prepare(units, &mut summary).await?;
        let state = RunState {
            run_id,
            halted: AtomicBool::new(false),
            summary: Mutex::new(summary),
        };

        futures::stream::iter(queue)
            .for_each_concurrent(self.config.workers.max(1), |(unit, checkpoint)| {
                let state = &state;
                let cancel = &cancel;
                async move {
                    if cancel.is_cancelled() || state.halted.load(Ordering::SeqCst) {
                        state.summary.lock().not_dispatched += 1;
                        return;
                    }
                    if let Err(e) = self.process_unit(state, unit, checkpoint, cancel).await {
                        tracing::error!(error = %e, "unit processing aborted");
                        state.summary.lock().failed += 1;
                    }
                }
            })
            .await;

        let mut summary = state.summary.into_inner();
        summary.halted = state.halted.load(Ordering::SeqCst);
        summary.cancelled = cancel.is_cancelled();
        Ok(self.finish(summary).await)
    }

    /// Skip committed units and write `pending` for the rest.
    async fn prepare(
        &self,
        units: Vec<UnitOfWork>,
        summary: &mut RunSummary,
    ) -> Result<Vec<(UnitOfWork, Checkpoint)>, PipelineError> {
        let existing: HashMap<UnitKey, Checkpoint> = self
            .checkpoints
            .load_all()
            .await?
            .into_iter()
            .map(|cp| (cp.key.clone(), cp))
            .collect();

        let mut queue = Vec::with_capacity(units.len());
        for unit in units {
            let previous = existing.get(unit.key());
            if previous.is_some_and(|cp| cp.status == CheckpointStatus::Succeeded) {
                summary.skipped_completed += 1;
                record_unit_outcome("skipped");
                continue;
            }

            let attempts = previous.map_or(0, |cp| cp.attempts);
            let checkpoint = Checkpoint::pending(unit.key().clone(), attempts);
            self.checkpoints.save(&checkpoint).await?;
            queue.push((unit.with_attempt_count(attempts), checkpoint));
        }

        tracing::info!(
            enqueued = queue.len(),
            skipped = summary.skipped_completed,
            "work list prepared"
        );
        Ok(queue)
    }

    async fn process_unit(
        &self,
        state: &RunState,
        mut unit: UnitOfWork,
        mut checkpoint: Checkpoint,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        unit.begin_attempt();
        checkpoint.start(Utc::now())?;
        self.persist(&checkpoint).await;
        tracing::info!(unit = %unit, attempt = unit.attempt_count(), "unit started");

        let started = Instant::now();
        let extracted = self.extractor.extract(&unit, cancel).await;
        record_stage_latency(Stage::Extract.as_str(), started.elapsed().as_secs_f64());
        let raw = match extracted {
            Ok(raw) => raw,
            Err(e) => return self.fail_unit(state, &mut checkpoint, &e.context, e.decision).await,
        };

        let raw_count = raw.len() as u64;
        let started = Instant::now();
        let output = self.transformer.transform(&unit, raw);
        record_stage_latency(Stage::Transform.as_str(), started.elapsed().as_secs_f64());

        let rejected = output.rejected.len() as u64;
        record_records("extracted", raw_count);
        record_records("rejected", rejected);
        {
            let mut summary = state.summary.lock();
            summary.records_extracted += raw_count;
            summary.rejected += rejected;
        }
        if rejected > 0 {
            tracing::warn!(unit = %unit, rejected, total = raw_count, "records rejected by validation");
        }

        if let Some(threshold) = self.config.rejection_threshold {
            let ratio = output.rejection_ratio();
            if ratio > threshold {
                let context = FailureContext::new(
                    Stage::Transform,
                    ErrorKind::MalformedData,
                    format!("rejected {rejected} of {raw_count} records ({ratio:.2} > {threshold:.2})"),
                    unit.clone(),
                );
                let decision = RetryDecision::abort(DecisionCategory::DataInvalid);
                return self.fail_unit(state, &mut checkpoint, &context, decision).await;
            }
        }

        if cancel.is_cancelled() {
            let context = FailureContext::new(
                Stage::Load,
                ErrorKind::Cancelled,
                "run cancelled before load",
                unit.clone(),
            );
            let decision = RetryDecision::abort(DecisionCategory::Unknown);
            return self.fail_unit(state, &mut checkpoint, &context, decision).await;
        }

        let started = Instant::now();
        let loaded = self.loader.load(&unit, &output.records, cancel).await;
        record_stage_latency(Stage::Load.as_str(), started.elapsed().as_secs_f64());
        let result = match loaded {
            Ok(result) => result,
            Err(e) => return self.fail_unit(state, &mut checkpoint, &e.context, e.decision).await,
        };

        checkpoint.succeed(Utc::now())?;
        self.persist(&checkpoint).await;

        record_records("inserted", result.inserted);
        record_records("updated", result.updated);
        record_unit_outcome("succeeded");
        {
            let mut summary = state.summary.lock();
            summary.succeeded += 1;
            summary.inserted += result.inserted;
            summary.updated += result.updated;
        }
        tracing::info!(
            unit = %unit,
            inserted = result.inserted,
            updated = result.updated,
            rejected,
            "unit succeeded"
        );
        Ok(())
    }

    /// Mark the unit failed, log the decision and escalate if asked to.
    async fn fail_unit(
        &self,
        state: &RunState,
        checkpoint: &mut Checkpoint,
        context: &FailureContext,
        decision: RetryDecision,
    ) -> Result<(), PipelineError> {
        let summary_line = context.summary();
        checkpoint.fail(Utc::now(), summary_line.clone())?;
        self.persist(checkpoint).await;
        record_unit_outcome("failed");

        let entry = DecisionLogEntry {
            run_id: state.run_id,
            unit_key: checkpoint.key.clone(),
            stage: context.stage,
            category: decision.category,
            action: decision.action,
            attempt_count: context.attempt_count,
            reason: context.message.clone(),
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.decision_log.record(&entry).await {
            tracing::error!(error = %e, unit = %context.unit, "failed to write decision log entry");
        }

        {
            let mut summary = state.summary.lock();
            summary.failed += 1;
            summary.failures.push(UnitFailureDto {
                unit_key: checkpoint.key.to_string(),
                error_summary: summary_line,
            });
        }
        tracing::warn!(
            unit = %context.unit,
            stage = %context.stage,
            category = %decision.category,
            action = %decision.action,
            "unit failed"
        );

        if decision.action == RetryAction::Escalate {
            self.escalate(state, context, decision).await;
        }
        Ok(())
    }

    async fn escalate(&self, state: &RunState, context: &FailureContext, decision: RetryDecision) {
        record_escalation(decision.category.as_str());
        state.summary.lock().escalations += 1;

        let halts_run = decision.category == DecisionCategory::ConnectivityLost;
        if halts_run {
            let first = state
                .halted
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
            if !first {
                tracing::debug!(unit = %context.unit, "run already halted, escalation not re-notified");
                return;
            }
            tracing::error!(
                unit = %context.unit,
                error = %context.message,
                "connectivity lost, halting dispatch"
            );
            if self.config.escalation_pause == PauseScope::Persistent {
                let pause = PauseRecord {
                    reason: context.summary(),
                    paused_at: Utc::now(),
                    run_id: state.run_id,
                };
                if let Err(e) = self.checkpoints.save_pause(&pause).await {
                    tracing::error!(error = %e, "failed to persist pause flag");
                }
            }
        } else {
            tracing::error!(
                unit = %context.unit,
                category = %decision.category,
                error = %context.message,
                "retries exhausted, escalating"
            );
        }

        let notice = EscalationNotice {
            run_id: state.run_id,
            unit_key: context.unit.key().to_string(),
            stage: context.stage,
            category: decision.category,
            attempt_count: context.attempt_count,
            message: context.message.clone(),
            halts_run,
        };
        self.notify(&Notification::Escalation(notice)).await;
    }

    async fn persist(&self, checkpoint: &Checkpoint) {
        if let Err(e) = self.checkpoints.save(checkpoint).await {
            tracing::error!(
                error = %e,
                unit = %checkpoint.key,
                status = %checkpoint.status,
                "failed to persist checkpoint"
            );
        }
    }

    async fn notify(&self, notification: &Notification) {
        if let Err(e) = self.notifier.notify(notification).await {
            tracing::warn!(error = %e, subject = %notification.subject(), "notification not delivered");
        }
    }

    async fn finish(&self, mut summary: RunSummary) -> RunSummary {
        summary.finished_at = Utc::now();
        tracing::info!(
            run_id = %summary.run_id,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped_completed,
            not_dispatched = summary.not_dispatched,
            inserted = summary.inserted,
            updated = summary.updated,
            rejected = summary.rejected,
            escalations = summary.escalations,
            halted = summary.halted,
            "pipeline run finished"
        );
        self.notify(&Notification::RunCompleted(summary.clone())).await;
        summary
    }
}
