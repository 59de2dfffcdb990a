//! Text-generation inference client.
//!
//! Speaks the hosted-inference request shape:
//! `{"inputs": <prompt>, "parameters": {"temperature": 0.0, "max_new_tokens": n}}`.
//! The answer is read from `generated_text`, which some deployments wrap in a
//! one-element array.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::application::ports::{InferenceError, InferencePort};
use crate::domain::failure::{DecisionCategory, Stage};

/// Configuration for [`HttpInferenceClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpInferenceConfig {
    /// Full model endpoint URL.
    pub endpoint: String,
    /// Bearer token, if the endpoint requires one.
    pub api_key: Option<String>,
    /// Transport-level timeout.
    pub timeout: Duration,
    /// Generation length cap.
    pub max_new_tokens: u32,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Debug, Serialize)]
struct GenerateParameters {
    temperature: f64,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Single(Generated),
    Batch(Vec<Generated>),
}

impl GenerateResponse {
    fn into_text(self) -> Option<String> {
        match self {
            Self::Single(g) => Some(g.generated_text),
            Self::Batch(items) => items.into_iter().next().map(|g| g.generated_text),
        }
    }
}

/// HTTP client implementing [`InferencePort`].
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    client: Client,
    config: HttpInferenceConfig,
}

impl HttpInferenceClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: HttpInferenceConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| InferenceError::Request {
                message: e.to_string(),
            })?;
        Ok(Self { client, config })
    }
}

/// Prompt carrying only the stage and the error text.
pub(crate) fn build_prompt(stage: Stage, message: &str) -> String {
    let labels: Vec<&str> = DecisionCategory::ALL.iter().map(DecisionCategory::as_str).collect();
    format!(
        "You classify failures in a market data ETL pipeline.\n\
         Stage: {stage}\n\
         Error: {message}\n\
         Answer with exactly one of: {}.\n\
         Category:",
        labels.join(", ")
    )
}

#[async_trait]
impl InferencePort for HttpInferenceClient {
    async fn classify_text(&self, stage: Stage, message: &str) -> Result<String, InferenceError> {
        let prompt = build_prompt(stage, message);
        let body = GenerateRequest {
            inputs: &prompt,
            parameters: GenerateParameters {
                temperature: 0.0,
                max_new_tokens: self.config.max_new_tokens,
                return_full_text: false,
            },
        };

        let mut request = self.client.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| InferenceError::Request {
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(InferenceError::Status {
                status: status.as_u16(),
            });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| InferenceError::Decode {
            message: e.to_string(),
        })?;

        parsed.into_text().ok_or_else(|| InferenceError::Decode {
            message: "empty generation list".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_category() {
        let prompt = build_prompt(Stage::Load, "connection reset by peer");
        assert!(prompt.contains("Stage: load"));
        assert!(prompt.contains("connection reset by peer"));
        for category in DecisionCategory::ALL {
            assert!(prompt.contains(category.as_str()));
        }
    }

    #[test]
    fn accepts_object_and_array_responses() {
        let single: GenerateResponse =
            serde_json::from_str(r#"{"generated_text": "transient"}"#).unwrap();
        assert_eq!(single.into_text().as_deref(), Some("transient"));

        let batch: GenerateResponse =
            serde_json::from_str(r#"[{"generated_text": "rate_limited"}]"#).unwrap();
        assert_eq!(batch.into_text().as_deref(), Some("rate_limited"));

        let empty: GenerateResponse = serde_json::from_str("[]").unwrap();
        assert!(empty.into_text().is_none());
    }
}
