//! Notifier that writes alerts to the tracing log.

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::application::ports::{Notification, NotifierPort, NotifyError};

/// Emits notifications as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotifierPort for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::Escalation(notice) if notice.halts_run => error!(
                run_id = %notice.run_id,
                unit = %notice.unit_key,
                stage = %notice.stage,
                category = %notice.category,
                attempts = notice.attempt_count,
                message = %notice.message,
                "Run halted after escalation"
            ),
            Notification::Escalation(notice) => warn!(
                run_id = %notice.run_id,
                unit = %notice.unit_key,
                stage = %notice.stage,
                category = %notice.category,
                attempts = notice.attempt_count,
                message = %notice.message,
                "Unit escalated"
            ),
            Notification::RunCompleted(summary) => info!(
                run_id = %summary.run_id,
                succeeded = summary.succeeded,
                failed = summary.failed,
                skipped = summary.skipped_completed,
                not_dispatched = summary.not_dispatched,
                inserted = summary.inserted,
                updated = summary.updated,
                rejected = summary.rejected,
                halted = summary.halted,
                "Run completed"
            ),
        }
        Ok(())
    }
}
