//! Record Store Port (Driven Port)
//!
//! Interface for persisting canonical bars.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::failure::ErrorKind;
use crate::domain::market_data::CanonicalRecord;
use crate::domain::shared::Symbol;

/// Storage error, shared by every store port.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The database could not be reached.
    #[error("Store connection error: {message}")]
    Connection {
        /// Error details.
        message: String,
    },

    /// A statement was rejected.
    #[error("Store query error: {message}")]
    Query {
        /// Error details.
        message: String,
    },

    /// A stored row could not be decoded.
    #[error("Store contains invalid data: {message}")]
    Corrupt {
        /// Error details.
        message: String,
    },
}

impl StoreError {
    /// Coarse error shape for classification.
    #[must_use]
    pub const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::Connection { .. } => ErrorKind::DbConnection,
            Self::Query { .. } => ErrorKind::DbQuery,
            Self::Corrupt { .. } => ErrorKind::MalformedData,
        }
    }
}

/// Outcome of an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadResult {
    /// New rows.
    pub inserted: u64,
    /// Rows that already existed and were overwritten.
    pub updated: u64,
}

impl LoadResult {
    /// Rows touched.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Port for the canonical record table.
///
/// Records are keyed by `(symbol, timestamp)`; at most one row per key.
#[async_trait]
pub trait RecordStorePort: Send + Sync {
    /// Insert or overwrite all records in one transaction.
    ///
    /// Either every record is written or none is.
    async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<LoadResult, StoreError>;

    /// Latest stored bar start for `symbol`.
    async fn latest_timestamp(&self, symbol: &Symbol) -> Result<Option<DateTime<Utc>>, StoreError>;

    /// Total stored rows.
    async fn count(&self) -> Result<u64, StoreError>;

    /// Register tickers in the stored ticker list; returns how many were new.
    async fn add_tickers(&self, symbols: &[Symbol]) -> Result<u64, StoreError>;

    /// Every stored ticker, sorted.
    async fn tickers(&self) -> Result<Vec<Symbol>, StoreError>;

    /// Stored rows for `symbol`, oldest first.
    async fn records_for(&self, symbol: &Symbol) -> Result<Vec<CanonicalRecord>, StoreError>;
}
