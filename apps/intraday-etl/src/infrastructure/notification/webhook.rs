//! Webhook notifier.
//!
//! Posts `{"subject": ..., "payload": <notification>}` as JSON. Any non-2xx
//! response is a delivery failure.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::application::ports::{Notification, NotifierPort, NotifyError};

/// Configuration for [`WebhookNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookNotifierConfig {
    /// Target URL.
    pub url: String,
    /// Request timeout.
    pub timeout: Duration,
}

#[derive(Serialize)]
struct WebhookBody<'a> {
    subject: String,
    payload: &'a Notification,
}

/// Delivers notifications to an HTTP endpoint.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    /// Create a new notifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: WebhookNotifierConfig) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NotifyError::Delivery {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            url: config.url,
        })
    }
}

#[async_trait]
impl NotifierPort for WebhookNotifier {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = WebhookBody {
            subject: notification.subject(),
            payload: notification,
        };

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery {
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(url = %self.url, subject = %body.subject, "webhook delivered");
            Ok(())
        } else {
            Err(NotifyError::Delivery {
                message: format!("webhook returned {status}"),
            })
        }
    }
}
