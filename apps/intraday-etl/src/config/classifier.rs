//! Error classifier delegation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::services::ClassifierConfig;
use crate::infrastructure::inference::HttpInferenceConfig;

/// Inference delegation configuration. Disabled means heuristics only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSettings {
    /// Delegate unmatched failures to the inference endpoint.
    #[serde(default)]
    pub enabled: bool,
    /// Model endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token; empty means none.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Deadline for one delegation.
    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,
    /// Attempt count from which delegation stops.
    #[serde(default = "default_delegate_max_attempts")]
    pub delegate_max_attempts: u32,
    /// Generation length cap.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_endpoint(),
            api_key: None,
            timeout_ms: default_timeout(),
            delegate_max_attempts: default_delegate_max_attempts(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

impl InferenceSettings {
    /// Classifier limits.
    #[must_use]
    pub const fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            delegate_max_attempts: self.delegate_max_attempts,
            delegation_timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    /// HTTP client settings, or `None` when delegation is disabled.
    #[must_use]
    pub fn http_config(&self) -> Option<HttpInferenceConfig> {
        self.enabled.then(|| HttpInferenceConfig {
            endpoint: self.endpoint.clone(),
            api_key: self.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout: Duration::from_millis(self.timeout_ms),
            max_new_tokens: self.max_new_tokens,
        })
    }
}

fn default_endpoint() -> String {
    "https://api-inference.huggingface.co/models/meta-llama/Llama-2-7b-chat-hf".to_string()
}

const fn default_timeout() -> u64 {
    10_000
}

const fn default_delegate_max_attempts() -> u32 {
    3
}

const fn default_max_new_tokens() -> u32 {
    8
}
