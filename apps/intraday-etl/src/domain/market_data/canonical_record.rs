//! Validated, normalized bar ready for persistence.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::Symbol;

/// A bar that passed validation.
///
/// Invariants (established by the transformer):
/// - all prices non-negative with `low <= open, close <= high`
/// - `timestamp` falls inside the unit's date range
/// - `symbol` is non-empty
///
/// Identity is `(symbol, timestamp)`; the store upserts on that key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Normalized ticker.
    pub symbol: Symbol,
    /// Bar start time.
    pub timestamp: DateTime<Utc>,
    /// Bar end time (`timestamp` + bar interval).
    pub interval_end: DateTime<Utc>,
    /// Opening price.
    pub open: Decimal,
    /// Highest price.
    pub high: Decimal,
    /// Lowest price.
    pub low: Decimal,
    /// Closing price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: u64,
}

impl CanonicalRecord {
    /// Natural key of the record.
    #[must_use]
    pub fn key(&self) -> (&Symbol, DateTime<Utc>) {
        (&self.symbol, self.timestamp)
    }
}
