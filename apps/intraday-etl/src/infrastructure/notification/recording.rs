//! Notifier that keeps every message in memory.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::application::ports::{EscalationNotice, Notification, NotifierPort, NotifyError};

/// Captures notifications for assertions and dry runs.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification received, in order.
    #[must_use]
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }

    /// Escalation notices only.
    #[must_use]
    pub fn escalations(&self) -> Vec<EscalationNotice> {
        self.sent
            .lock()
            .iter()
            .filter_map(|n| match n {
                Notification::Escalation(notice) => Some(notice.clone()),
                Notification::RunCompleted(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}
