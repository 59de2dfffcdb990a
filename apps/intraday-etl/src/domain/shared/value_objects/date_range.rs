//! Inclusive calendar date range.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::shared::DomainError;

/// An inclusive `[start, end]` range of UTC calendar dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    /// Create a new range.
    ///
    /// # Errors
    ///
    /// Returns error if `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DomainError> {
        if start > end {
            return Err(DomainError::InvalidValue {
                field: "date_range".to_string(),
                message: format!("start {start} is after end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    /// First date of the range.
    #[must_use]
    pub const fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last date of the range (inclusive).
    #[must_use]
    pub const fn end(&self) -> NaiveDate {
        self.end
    }

    /// Check whether `date` falls inside the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of calendar days covered.
    #[must_use]
    pub fn len_days(&self) -> u64 {
        (self.end - self.start).num_days().unsigned_abs() + 1
    }

    /// Split the range into consecutive windows of at most `days` days.
    ///
    /// Windows are anchored at `start`, so the same range and window size
    /// always produce the same grid.
    #[must_use]
    pub fn windows(&self, days: u32) -> Vec<Self> {
        let step = u64::from(days.max(1));
        let mut windows = Vec::new();
        let mut cursor = self.start;

        while cursor <= self.end {
            let tentative = cursor
                .checked_add_days(Days::new(step - 1))
                .unwrap_or(self.end);
            let window_end = tentative.min(self.end);
            windows.push(Self {
                start: cursor,
                end: window_end,
            });
            match window_end.checked_add_days(Days::new(1)) {
                Some(next) => cursor = next,
                None => break,
            }
        }

        windows
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}
