//! Configuration for the ETL pipeline.
//!
//! Loaded once per run from YAML, with `${VAR}` / `${VAR:-default}`
//! environment interpolation applied before parsing.
//!
//! # Usage
//!
//! ```rust,ignore
//! use intraday_etl::config::load_config;
//!
//! // Load from default path (config.yaml)
//! let config = load_config(None)?;
//!
//! // Load from custom path
//! let config = load_config(Some("custom/config.yaml"))?;
//!
//! println!("workers: {}", config.pipeline.workers);
//! ```

mod classifier;
mod environment;
mod notification;
mod observability;
mod persistence;
mod pipeline;
mod retry;
mod source;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use classifier::InferenceSettings;
pub use environment::EnvironmentConfig;
pub use notification::{NotificationConfig, NotifierKind};
pub use observability::{LoggingConfig, ObservabilityConfig};
pub use persistence::PersistenceConfig;
pub use pipeline::PipelineSettings;
pub use retry::RetryConfig;
pub use source::{RateLimitSettings, SourceConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Environment configuration.
    #[serde(default)]
    pub environment: EnvironmentConfig,
    /// Quote source and work list.
    #[serde(default)]
    pub source: SourceConfig,
    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Classifier delegation.
    #[serde(default)]
    pub classifier: InferenceSettings,
    /// Orchestrator.
    #[serde(default)]
    pub pipeline: PipelineSettings,
    /// Database.
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// Alerting channel.
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================
// Configuration Loading
// ============================================

/// Load configuration from a YAML file with environment variable interpolation.
///
/// # Arguments
///
/// * `path` - Optional path to the config file. Defaults to "config.yaml".
///
/// # Errors
///
/// Returns a `ConfigError` if the file cannot be read, parsed, or validated.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or("config.yaml");

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string (useful for testing).
///
/// # Errors
///
/// Returns a `ConfigError` if the YAML cannot be parsed or validated.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = serde_yaml_bw::from_str(&interpolated)?;
    validate_config(&config)?;
    Ok(config)
}

/// Interpolate environment variables in a string.
///
/// Supports both `${VAR}` and `${VAR:-default}` syntax.
#[allow(clippy::expect_used)] // Regex is compile-time constant; expect() is safe here
fn interpolate_env_vars(input: &str) -> String {
    use std::sync::OnceLock;

    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let mut result = input.to_string();

    // Match ${VAR} or ${VAR:-default} patterns
    let re = ENV_VAR_REGEX.get_or_init(|| {
        // This regex pattern is compile-time constant and always valid
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    for cap in re.captures_iter(input) {
        // Group 0 and group 1 are guaranteed by the regex pattern structure
        let Some(full_match) = cap.get(0) else {
            continue;
        };
        let Some(var_match) = cap.get(1) else {
            continue;
        };
        let full_match = full_match.as_str();
        let var_name = var_match.as_str();
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.map_or_else(String::new, str::to_string),
        };

        result = result.replace(full_match, &value);
    }

    result
}

/// Validate configuration values.
fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    if !EnvironmentConfig::VALID_NAMES.contains(&config.environment.name.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "environment.name must be one of: {:?}",
            EnvironmentConfig::VALID_NAMES
        )));
    }

    let source = &config.source;
    if !source.stored_tickers && source.symbols.iter().all(|s| s.trim().is_empty()) {
        return invalid("source.symbols must list at least one ticker unless source.stored_tickers is set");
    }
    if source.window_days == 0 {
        return invalid("source.window_days must be positive");
    }
    if source.call_timeout_secs == 0 || source.request_timeout_secs == 0 {
        return invalid("source timeouts must be positive");
    }
    if source.rate_limit.max_requests > 0 && source.rate_limit.window_secs == 0 {
        return invalid("source.rate_limit.window_secs must be positive when throttling is enabled");
    }
    source.bar_interval()?;
    if let (Some(start), Some(end)) = (source.start_date, source.end_date)
        && start > end
    {
        return invalid("source.start_date must not be after source.end_date");
    }

    let retry = &config.retry;
    if !(0.0..=1.0).contains(&retry.jitter_factor) {
        return invalid("retry.jitter_factor must be between 0.0 and 1.0");
    }
    if retry.base_delay_ms > retry.max_delay_ms {
        return invalid("retry.base_delay_ms must not exceed retry.max_delay_ms");
    }

    if config.classifier.enabled && config.classifier.endpoint.trim().is_empty() {
        return invalid("classifier.endpoint is required when the classifier is enabled");
    }

    if config.pipeline.workers == 0 {
        return invalid("pipeline.workers must be positive");
    }
    if let Some(threshold) = config.pipeline.rejection_threshold
        && !(0.0..=1.0).contains(&threshold)
    {
        return invalid("pipeline.rejection_threshold must be between 0.0 and 1.0");
    }

    if config.persistence.max_connections == 0 {
        return invalid("persistence.max_connections must be positive");
    }

    if config.notification.kind == NotifierKind::Webhook && config.notification.webhook_config().is_none() {
        return invalid("notification.webhook_url is required for the webhook notifier");
    }

    Ok(())
}
