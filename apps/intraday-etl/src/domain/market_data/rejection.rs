//! Records dropped by validation.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RawRecord;

/// Numeric field of a bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    /// Opening price.
    Open,
    /// Highest price.
    High,
    /// Lowest price.
    Low,
    /// Closing price.
    Close,
    /// Traded volume.
    Volume,
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "open",
            Self::High => "high",
            Self::Low => "low",
            Self::Close => "close",
            Self::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// Why a raw record was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectReason {
    /// Symbol missing or blank.
    EmptySymbol,
    /// Symbol differs from the unit being processed.
    SymbolMismatch {
        /// Symbol of the unit of work.
        expected: String,
        /// Symbol found on the record.
        actual: String,
    },
    /// Timestamp absent.
    MissingTimestamp,
    /// A numeric field is absent.
    MissingField {
        /// The absent field.
        field: PriceField,
    },
    /// A numeric field is NaN or infinite.
    NonFinite {
        /// The offending field.
        field: PriceField,
    },
    /// A numeric field is below zero.
    Negative {
        /// The offending field.
        field: PriceField,
    },
    /// Volume too large to store as a signed 64-bit integer.
    VolumeOutOfRange,
    /// OHLC ordering violated (`low <= open, close <= high`).
    InconsistentOhlc,
    /// Timestamp outside the unit's date range.
    OutOfRange {
        /// Date of the bar.
        date: NaiveDate,
    },
    /// Another record in the batch already carries this timestamp.
    DuplicateTimestamp,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptySymbol => write!(f, "symbol is empty"),
            Self::SymbolMismatch { expected, actual } => {
                write!(f, "symbol {actual} does not match unit symbol {expected}")
            }
            Self::MissingTimestamp => write!(f, "timestamp is missing"),
            Self::MissingField { field } => write!(f, "{field} is missing"),
            Self::NonFinite { field } => write!(f, "{field} is not a finite number"),
            Self::Negative { field } => write!(f, "{field} is negative"),
            Self::VolumeOutOfRange => write!(f, "volume exceeds {}", i64::MAX),
            Self::InconsistentOhlc => write!(f, "OHLC values are inconsistent"),
            Self::OutOfRange { date } => write!(f, "date {date} is outside the unit range"),
            Self::DuplicateTimestamp => write!(f, "duplicate timestamp in batch"),
        }
    }
}

/// A raw record together with the reason it was dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// The record as received.
    pub raw: RawRecord,
    /// Why it was rejected.
    pub reason: RejectReason,
}
