//! Infrastructure Layer
//!
//! Adapters implementing the ports defined in the application layer:
//!
//! - `quote_source/`: chart API client and an in-memory source
//! - `persistence/`: SQLite store for bars, checkpoints and the decision log
//! - `notification/`: log, webhook and recording notifiers
//! - `inference/`: text-generation client for classifier delegation

pub mod inference;
pub mod notification;
pub mod persistence;
pub mod quote_source;
