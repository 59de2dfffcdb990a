//! Persistence Adapters
//!
//! SQLite storage for bars, checkpoints, the pause flag and the decision
//! log, plus in-memory equivalents for tests.

pub mod in_memory;
pub mod sqlite;

pub use in_memory::{InMemoryCheckpointStore, InMemoryDecisionLog, InMemoryRecordStore};
pub use sqlite::{SqliteStore, SqliteStoreConfig};
