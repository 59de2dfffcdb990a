//! Work List Generator
//!
//! Expands symbols over a date range into units of work on a fixed window
//! grid. Symbols come from configuration and, optionally, from the ticker
//! list kept in the record store. Keys stay stable between runs, which is what lets the
//! orchestrator match them against stored checkpoints.

use std::sync::Arc;

use crate::application::ports::{RecordStorePort, StoreError};
use crate::domain::shared::{DateRange, Symbol};
use crate::domain::work::UnitOfWork;

/// What to expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkListSpec {
    /// Tickers, in configuration order.
    pub symbols: Vec<Symbol>,
    /// Dates to cover.
    pub range: DateRange,
    /// Days per unit.
    pub window_days: u32,
    /// Drop windows that end before the latest stored bar of each symbol.
    pub resume_from_store: bool,
    /// Register `symbols` in the stored ticker list and cover every ticker
    /// listed there.
    pub include_stored_tickers: bool,
}

/// Builds the work list.
pub struct WorkListGenerator {
    store: Arc<dyn RecordStorePort>,
}

impl WorkListGenerator {
    /// Create a new generator.
    #[must_use]
    pub fn new(store: Arc<dyn RecordStorePort>) -> Self {
        Self { store }
    }

    /// Produce units for every symbol, symbol-major.
    ///
    /// With resume enabled the window containing the latest stored bar is
    /// kept, since that day may have been partial.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot report the latest timestamp or
    /// the stored ticker list.
    pub async fn generate(&self, spec: &WorkListSpec) -> Result<Vec<UnitOfWork>, StoreError> {
        let symbols = self.symbols(spec).await?;
        let windows = spec.range.windows(spec.window_days);
        let mut units = Vec::with_capacity(windows.len() * symbols.len());

        for symbol in &symbols {
            let resume_date = if spec.resume_from_store {
                self.store
                    .latest_timestamp(symbol)
                    .await?
                    .map(|ts| ts.date_naive())
            } else {
                None
            };

            let before = units.len();
            units.extend(
                windows
                    .iter()
                    .filter(|w| resume_date.is_none_or(|date| w.end() >= date))
                    .map(|w| UnitOfWork::new(symbol.clone(), *w)),
            );

            tracing::debug!(
                symbol = %symbol,
                units = units.len() - before,
                resume_date = ?resume_date,
                "work list expanded"
            );
        }

        Ok(units)
    }

    /// Configured symbols first, then stored tickers not already listed.
    async fn symbols(&self, spec: &WorkListSpec) -> Result<Vec<Symbol>, StoreError> {
        if !spec.include_stored_tickers {
            return Ok(spec.symbols.clone());
        }

        let registered = self.store.add_tickers(&spec.symbols).await?;
        let mut symbols = spec.symbols.clone();
        for ticker in self.store.tickers().await? {
            if !symbols.contains(&ticker) {
                symbols.push(ticker);
            }
        }

        tracing::info!(
            configured = spec.symbols.len(),
            registered,
            total = symbols.len(),
            "ticker list merged"
        );
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::market_data::CanonicalRecord;
    use crate::infrastructure::persistence::InMemoryRecordStore;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
    }

    fn spec(resume: bool) -> WorkListSpec {
        WorkListSpec {
            symbols: vec![Symbol::new("AAPL"), Symbol::new("MSFT")],
            range: DateRange::new(date(1), date(10)).unwrap(),
            window_days: 4,
            resume_from_store: resume,
            include_stored_tickers: false,
        }
    }

    #[tokio::test]
    async fn expands_symbols_over_window_grid() {
        let generator = WorkListGenerator::new(Arc::new(InMemoryRecordStore::new()));
        let units = generator.generate(&spec(false)).await.unwrap();

        let keys: Vec<_> = units.iter().map(ToString::to_string).collect();
        assert_eq!(
            keys,
            vec![
                "AAPL:2024-03-01..2024-03-04",
                "AAPL:2024-03-05..2024-03-08",
                "AAPL:2024-03-09..2024-03-10",
                "MSFT:2024-03-01..2024-03-04",
                "MSFT:2024-03-05..2024-03-08",
                "MSFT:2024-03-09..2024-03-10",
            ]
        );
    }

    #[tokio::test]
    async fn resume_skips_windows_before_latest_bar() {
        let store = Arc::new(InMemoryRecordStore::new());
        let ts = Utc.with_ymd_and_hms(2024, 3, 6, 15, 0, 0).unwrap();
        store
            .upsert_batch(&[CanonicalRecord {
                symbol: Symbol::new("AAPL"),
                timestamp: ts,
                interval_end: ts + chrono::Duration::hours(1),
                open: dec!(1),
                high: dec!(1),
                low: dec!(1),
                close: dec!(1),
                volume: 1,
            }])
            .await
            .unwrap();

        let generator = WorkListGenerator::new(store);
        let units = generator.generate(&spec(true)).await.unwrap();
        let aapl: Vec<_> = units
            .iter()
            .filter(|u| u.symbol().as_str() == "AAPL")
            .map(UnitOfWork::start_date)
            .collect();
        assert_eq!(aapl, vec![date(5), date(9)]);
        assert_eq!(units.iter().filter(|u| u.symbol().as_str() == "MSFT").count(), 3);
    }

    #[tokio::test]
    async fn stored_tickers_extend_configured_symbols() {
        let store = Arc::new(InMemoryRecordStore::new());
        store
            .add_tickers(&[Symbol::new("NVDA"), Symbol::new("AAPL")])
            .await
            .unwrap();

        let generator = WorkListGenerator::new(store.clone());
        let spec = WorkListSpec {
            include_stored_tickers: true,
            window_days: 10,
            ..spec(false)
        };
        let units = generator.generate(&spec).await.unwrap();

        let symbols: Vec<_> = units.iter().map(|u| u.symbol().as_str().to_string()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "NVDA"]);

        let stored: Vec<_> = store.tickers().await.unwrap();
        assert_eq!(
            stored,
            vec![Symbol::new("AAPL"), Symbol::new("MSFT"), Symbol::new("NVDA")]
        );
    }

    #[tokio::test]
    async fn stored_tickers_ignored_unless_enabled() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.add_tickers(&[Symbol::new("NVDA")]).await.unwrap();

        let units = WorkListGenerator::new(store.clone())
            .generate(&spec(false))
            .await
            .unwrap();
        assert!(units.iter().all(|u| u.symbol().as_str() != "NVDA"));
        assert_eq!(store.tickers().await.unwrap().len(), 1);
    }
}
