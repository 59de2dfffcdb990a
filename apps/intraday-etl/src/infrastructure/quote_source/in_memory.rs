//! In-memory quote source for tests and demos.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use crate::application::ports::{QuoteSourcePort, SourceError};
use crate::domain::market_data::RawRecord;
use crate::domain::shared::Symbol;

/// In-memory implementation of `QuoteSourcePort`.
///
/// Serves stored bars filtered by date. Queued failures are returned first,
/// one per call, before any data is served.
#[derive(Debug, Default)]
pub struct InMemoryQuoteSource {
    bars: Mutex<HashMap<Symbol, Vec<RawRecord>>>,
    failures: Mutex<VecDeque<SourceError>>,
    calls: AtomicUsize,
}

impl InMemoryQuoteSource {
    /// Create an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add bars for `symbol`.
    #[must_use]
    pub fn with_bars(self, symbol: &Symbol, bars: Vec<RawRecord>) -> Self {
        self.bars.lock().entry(symbol.clone()).or_default().extend(bars);
        self
    }

    /// Queue a failure for the next call.
    pub fn push_failure(&self, error: SourceError) {
        self.failures.lock().push_back(error);
    }

    /// Number of `fetch` calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuoteSourcePort for InMemoryQuoteSource {
    async fn fetch(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RawRecord>, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let bars = self.bars.lock();
        Ok(bars
            .get(symbol)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| {
                        r.timestamp
                            .is_none_or(|ts| (start..=end).contains(&ts.date_naive()))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn bar(day: u32) -> RawRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 15, 0, 0).unwrap();
        RawRecord::bar("SPY", ts, 1.0, 1.0, 1.0, 1.0, 1.0)
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    #[tokio::test]
    async fn filters_by_date() {
        let spy = Symbol::new("SPY");
        let source = InMemoryQuoteSource::new().with_bars(&spy, vec![bar(2), bar(3), bar(4)]);

        let records = source.fetch(&spy, date(3), date(4)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(source.fetch(&Symbol::new("QQQ"), date(1), date(9)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn queued_failures_come_first() {
        let spy = Symbol::new("SPY");
        let source = InMemoryQuoteSource::new().with_bars(&spy, vec![bar(2)]);
        source.push_failure(SourceError::Timeout);

        assert_eq!(source.fetch(&spy, date(2), date(2)).await, Err(SourceError::Timeout));
        assert_eq!(source.fetch(&spy, date(2), date(2)).await.unwrap().len(), 1);
        assert_eq!(source.calls(), 2);
    }
}
