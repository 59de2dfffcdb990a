//! Inference Port (Driven Port)
//!
//! Optional language-model classifier consulted when no heuristic matches.
//! Responses are free text and must be treated as untrusted.

use async_trait::async_trait;

use crate::domain::failure::Stage;

/// Inference error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    /// Request could not be sent.
    #[error("Inference request failed: {message}")]
    Request {
        /// Error details.
        message: String,
    },

    /// Endpoint answered with a non-success status.
    #[error("Inference endpoint returned HTTP {status}")]
    Status {
        /// Status code.
        status: u16,
    },

    /// Response body had an unexpected shape.
    #[error("Inference response could not be decoded: {message}")]
    Decode {
        /// Error details.
        message: String,
    },
}

/// Port for the inference classifier.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InferencePort: Send + Sync {
    /// Ask for a category label given only the stage and error message.
    async fn classify_text(&self, stage: Stage, message: &str) -> Result<String, InferenceError>;
}
