//! Alerting channel settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::infrastructure::notification::WebhookNotifierConfig;

/// Which notifier to wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifierKind {
    /// Structured log events.
    #[default]
    Log,
    /// JSON POST to `webhook_url`.
    Webhook,
    /// Drop every notification.
    None,
}

/// Notification configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Channel.
    #[serde(default)]
    pub kind: NotifierKind,
    /// Target for the webhook channel.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Webhook request timeout; defaults to 10 seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl NotificationConfig {
    /// Webhook settings, when that channel is selected and a URL is set.
    #[must_use]
    pub fn webhook_config(&self) -> Option<WebhookNotifierConfig> {
        match (self.kind, &self.webhook_url) {
            (NotifierKind::Webhook, Some(url)) if !url.trim().is_empty() => Some(WebhookNotifierConfig {
                url: url.clone(),
                timeout: Duration::from_secs(self.timeout_secs.unwrap_or(10)),
            }),
            _ => None,
        }
    }
}
