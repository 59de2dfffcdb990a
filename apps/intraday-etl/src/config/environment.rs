//! Deployment environment.

use serde::{Deserialize, Serialize};

/// Environment configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// Deployment name (`development`, `staging`, `production`).
    #[serde(default = "default_environment_name")]
    pub name: String,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
        }
    }
}

impl EnvironmentConfig {
    /// Accepted environment names.
    pub const VALID_NAMES: [&'static str; 3] = ["development", "staging", "production"];

    /// Whether this is a production deployment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.name == "production"
    }
}

fn default_environment_name() -> String {
    "development".to_string()
}
