//! Error Classifier
//!
//! Maps a failure context to a [`DecisionCategory`]. Fixed heuristics cover
//! the common failure shapes; anything they do not recognise may be handed to
//! an inference collaborator, whose free-text answer is normalised onto the
//! fixed category set. Delegation is time-bounded and never retried.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::InferencePort;
use crate::domain::failure::{DecisionCategory, ErrorKind, FailureContext, Stage};

/// Configuration for the error classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Delegate only while the failure site has fewer retries than this.
    pub delegate_max_attempts: u32,
    /// Deadline for one delegation call.
    pub delegation_timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            delegate_max_attempts: 3,
            delegation_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP statuses that mean the request itself is wrong for this unit.
const INVALID_REQUEST_STATUS_CODES: &[u16] = &[
    400, // Bad Request
    404, // Not Found (unknown symbol)
    410, // Gone (delisted)
    422, // Unprocessable Entity
];

/// Heuristic-first classifier with optional delegation.
#[derive(Clone)]
pub struct ErrorClassifier {
    inference: Option<Arc<dyn InferencePort>>,
    config: ClassifierConfig,
}

impl std::fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("delegating", &self.inference.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl ErrorClassifier {
    /// Classifier that never delegates.
    #[must_use]
    pub const fn heuristic_only() -> Self {
        Self {
            inference: None,
            config: ClassifierConfig {
                delegate_max_attempts: 0,
                delegation_timeout: Duration::ZERO,
            },
        }
    }

    /// Classifier that delegates unmatched failures to `inference`.
    #[must_use]
    pub fn with_inference(inference: Arc<dyn InferencePort>, config: ClassifierConfig) -> Self {
        Self {
            inference: Some(inference),
            config,
        }
    }

    /// Assign a category to a failure.
    pub async fn classify(&self, context: &FailureContext) -> DecisionCategory {
        if let Some(category) = Self::heuristic(context) {
            return category;
        }

        match &self.inference {
            Some(inference) if context.attempt_count < self.config.delegate_max_attempts => {
                self.delegate(inference.as_ref(), context).await
            }
            _ => DecisionCategory::Unknown,
        }
    }

    /// Fixed rules; `None` when no rule matches.
    #[must_use]
    pub fn heuristic(context: &FailureContext) -> Option<DecisionCategory> {
        match (context.error_kind, context.stage) {
            (ErrorKind::Cancelled, _) => Some(DecisionCategory::Unknown),
            (ErrorKind::HttpStatus(429 | 503), _) => Some(DecisionCategory::RateLimited),
            (ErrorKind::HttpStatus(status), _) if status == 408 || (500..600).contains(&status) => {
                Some(DecisionCategory::Transient)
            }
            (ErrorKind::HttpStatus(status), _) if INVALID_REQUEST_STATUS_CODES.contains(&status) => {
                Some(DecisionCategory::DataInvalid)
            }
            (ErrorKind::Timeout, Stage::Extract) => Some(DecisionCategory::RateLimited),
            (ErrorKind::Network, Stage::Extract) => Some(DecisionCategory::Transient),
            (ErrorKind::Timeout | ErrorKind::Network | ErrorKind::DbConnection, Stage::Load) => {
                Some(DecisionCategory::ConnectivityLost)
            }
            (ErrorKind::DbConnection, _) => Some(DecisionCategory::ConnectivityLost),
            (ErrorKind::MalformedData, _) => Some(DecisionCategory::DataInvalid),
            _ => None,
        }
    }

    async fn delegate(&self, inference: &dyn InferencePort, context: &FailureContext) -> DecisionCategory {
        let call = inference.classify_text(context.stage, &context.message);
        match tokio::time::timeout(self.config.delegation_timeout, call).await {
            Ok(Ok(answer)) => {
                let category = normalize_answer(&answer);
                tracing::debug!(
                    stage = %context.stage,
                    attempt = context.attempt_count,
                    category = %category,
                    "delegated classification"
                );
                category
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, stage = %context.stage, "classifier delegation failed");
                DecisionCategory::Unknown
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.delegation_timeout.as_millis(),
                    stage = %context.stage,
                    "classifier delegation timed out"
                );
                DecisionCategory::Unknown
            }
        }
    }
}

/// Map an untrusted free-text answer onto the fixed category set.
///
/// Accepts a category label or an action word (`retry`, `abort`,
/// `escalate`), optionally quoted or followed by punctuation. Anything else
/// is `unknown`.
#[must_use]
pub fn normalize_answer(answer: &str) -> DecisionCategory {
    let first_line = answer.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let cleaned = first_line
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '`' || c == '.' || c == '!');

    if let Some(category) = DecisionCategory::from_label(cleaned) {
        return category;
    }

    match cleaned.to_ascii_lowercase().as_str() {
        "retry" => DecisionCategory::Transient,
        "abort" => DecisionCategory::DataInvalid,
        _ => DecisionCategory::Unknown,
    }
}
