//! Notification Adapters
//!
//! Alerting channels for escalations and run summaries.

mod log;
mod recording;
mod webhook;

pub use log::LogNotifier;
pub use recording::RecordingNotifier;
pub use webhook::{WebhookNotifier, WebhookNotifierConfig};
