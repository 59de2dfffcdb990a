//! Unit of work: one symbol over one date range.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{DateRange, Symbol};

/// Identity of a unit of work and of its checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitKey {
    /// Ticker.
    pub symbol: Symbol,
    /// Covered dates.
    pub range: DateRange,
}

impl UnitKey {
    /// Create a new key.
    #[must_use]
    pub const fn new(symbol: Symbol, range: DateRange) -> Self {
        Self { symbol, range }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.range)
    }
}

/// One extract-transform-load task.
///
/// Everything except `attempt_count` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitOfWork {
    key: UnitKey,
    attempt_count: u32,
}

impl UnitOfWork {
    /// Create a fresh unit with no recorded attempts.
    #[must_use]
    pub const fn new(symbol: Symbol, range: DateRange) -> Self {
        Self {
            key: UnitKey::new(symbol, range),
            attempt_count: 0,
        }
    }

    /// Carry over the attempt count recorded by earlier runs.
    #[must_use]
    pub const fn with_attempt_count(mut self, attempt_count: u32) -> Self {
        self.attempt_count = attempt_count;
        self
    }

    /// Unit identity.
    #[must_use]
    pub const fn key(&self) -> &UnitKey {
        &self.key
    }

    /// Ticker.
    #[must_use]
    pub const fn symbol(&self) -> &Symbol {
        &self.key.symbol
    }

    /// Covered dates.
    #[must_use]
    pub const fn range(&self) -> DateRange {
        self.key.range
    }

    /// First date (inclusive).
    #[must_use]
    pub const fn start_date(&self) -> NaiveDate {
        self.key.range.start()
    }

    /// Last date (inclusive).
    #[must_use]
    pub const fn end_date(&self) -> NaiveDate {
        self.key.range.end()
    }

    /// Number of times processing of this unit has started.
    #[must_use]
    pub const fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    /// Record the start of another processing attempt.
    pub const fn begin_attempt(&mut self) {
        self.attempt_count = self.attempt_count.saturating_add(1);
    }
}

impl fmt::Display for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> UnitOfWork {
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
        )
        .unwrap();
        UnitOfWork::new(Symbol::new("aapl"), range)
    }

    #[test]
    fn display_uses_key() {
        assert_eq!(unit().to_string(), "AAPL:2024-03-01..2024-03-07");
    }

    #[test]
    fn begin_attempt_increments() {
        let mut unit = unit().with_attempt_count(2);
        unit.begin_attempt();
        assert_eq!(unit.attempt_count(), 3);
    }
}
