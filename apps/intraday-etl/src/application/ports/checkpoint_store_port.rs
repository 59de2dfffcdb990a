//! Checkpoint Store Port (Driven Port)
//!
//! Durable unit status and the persistent pause flag.

use async_trait::async_trait;

use super::StoreError;
use crate::domain::work::{Checkpoint, PauseRecord};

/// Port for checkpoints.
///
/// `save` is an atomic single-row upsert keyed by the unit key.
#[async_trait]
pub trait CheckpointStorePort: Send + Sync {
    /// All stored checkpoints.
    async fn load_all(&self) -> Result<Vec<Checkpoint>, StoreError>;

    /// Insert or overwrite one checkpoint.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError>;

    /// Current pause flag, if set.
    async fn load_pause(&self) -> Result<Option<PauseRecord>, StoreError>;

    /// Set the pause flag.
    async fn save_pause(&self, pause: &PauseRecord) -> Result<(), StoreError>;

    /// Remove the pause flag. Returns whether one was set.
    async fn clear_pause(&self) -> Result<bool, StoreError>;
}
