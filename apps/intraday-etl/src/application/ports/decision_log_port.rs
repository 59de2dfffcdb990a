//! Decision Log Port (Driven Port)
//!
//! Audit trail of terminal retry decisions.

use async_trait::async_trait;
use uuid::Uuid;

use super::StoreError;
use crate::domain::failure::DecisionLogEntry;

/// Port for the decision log.
#[async_trait]
pub trait DecisionLogPort: Send + Sync {
    /// Append an entry.
    async fn record(&self, entry: &DecisionLogEntry) -> Result<(), StoreError>;

    /// Entries written by `run_id`, oldest first.
    async fn entries_for_run(&self, run_id: Uuid) -> Result<Vec<DecisionLogEntry>, StoreError>;
}
