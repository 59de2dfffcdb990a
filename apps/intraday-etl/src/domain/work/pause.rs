//! Persisted halt flag.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Blocks dispatch in later runs until an operator clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseRecord {
    /// Why the pipeline paused.
    pub reason: String,
    /// When the pause was written.
    pub paused_at: DateTime<Utc>,
    /// Run that escalated.
    pub run_id: Uuid,
}
