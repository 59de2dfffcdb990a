//! In-memory stores for tests and dry runs.
//!
//! Not for production use: nothing survives the process.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::application::ports::{
    CheckpointStorePort, DecisionLogPort, LoadResult, RecordStorePort, StoreError,
};
use crate::domain::failure::DecisionLogEntry;
use crate::domain::market_data::CanonicalRecord;
use crate::domain::shared::Symbol;
use crate::domain::work::{Checkpoint, CheckpointStatus, PauseRecord, UnitKey};

/// In-memory implementation of `RecordStorePort`.
///
/// Can be switched offline to simulate a lost database connection.
#[derive(Debug)]
pub struct InMemoryRecordStore {
    records: RwLock<BTreeMap<(Symbol, DateTime<Utc>), CanonicalRecord>>,
    tickers: RwLock<BTreeSet<Symbol>>,
    available: AtomicBool,
    upsert_calls: AtomicUsize,
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryRecordStore {
    /// Create a new empty, available store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            tickers: RwLock::new(BTreeSet::new()),
            available: AtomicBool::new(true),
            upsert_calls: AtomicUsize::new(0),
        }
    }

    /// Toggle availability. While unavailable every call fails with a
    /// connection error.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of `upsert_batch` calls, including failed ones.
    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Number of stored bars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection {
                message: "in-memory store offline".to_string(),
            })
        }
    }
}

#[async_trait]
impl RecordStorePort for InMemoryRecordStore {
    async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<LoadResult, StoreError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_available()?;

        let mut stored = self.records.write();
        let mut result = LoadResult::default();
        for record in records {
            let key = (record.symbol.clone(), record.timestamp);
            if stored.insert(key, record.clone()).is_some() {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }
        Ok(result)
    }

    async fn latest_timestamp(&self, symbol: &Symbol) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .records
            .read()
            .keys()
            .filter(|(s, _)| s == symbol)
            .map(|(_, ts)| *ts)
            .max())
    }

    async fn count(&self) -> Result<u64, StoreError> {
        self.ensure_available()?;
        Ok(self.records.read().len() as u64)
    }

    async fn add_tickers(&self, symbols: &[Symbol]) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let mut tickers = self.tickers.write();
        Ok(symbols.iter().filter(|s| tickers.insert((*s).clone())).count() as u64)
    }

    async fn tickers(&self) -> Result<Vec<Symbol>, StoreError> {
        self.ensure_available()?;
        Ok(self.tickers.read().iter().cloned().collect())
    }

    async fn records_for(&self, symbol: &Symbol) -> Result<Vec<CanonicalRecord>, StoreError> {
        self.ensure_available()?;
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| &r.symbol == symbol)
            .cloned()
            .collect())
    }
}

/// In-memory implementation of `CheckpointStorePort`.
///
/// Keeps every status ever written per unit so tests can assert on the
/// sequence of transitions.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: RwLock<HashMap<UnitKey, Checkpoint>>,
    history: RwLock<Vec<(UnitKey, CheckpointStatus)>>,
    pause: RwLock<Option<PauseRecord>>,
}

impl InMemoryCheckpointStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a checkpoint without recording history.
    pub fn insert(&self, checkpoint: Checkpoint) {
        self.checkpoints
            .write()
            .insert(checkpoint.key.clone(), checkpoint);
    }

    /// Current checkpoint for a unit.
    #[must_use]
    pub fn get(&self, key: &UnitKey) -> Option<Checkpoint> {
        self.checkpoints.read().get(key).cloned()
    }

    /// Statuses written for a unit, oldest first.
    #[must_use]
    pub fn history_for(&self, key: &UnitKey) -> Vec<CheckpointStatus> {
        self.history
            .read()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, status)| *status)
            .collect()
    }
}

#[async_trait]
impl CheckpointStorePort for InMemoryCheckpointStore {
    async fn load_all(&self) -> Result<Vec<Checkpoint>, StoreError> {
        Ok(self.checkpoints.read().values().cloned().collect())
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        self.history
            .write()
            .push((checkpoint.key.clone(), checkpoint.status));
        self.checkpoints
            .write()
            .insert(checkpoint.key.clone(), checkpoint.clone());
        Ok(())
    }

    async fn load_pause(&self) -> Result<Option<PauseRecord>, StoreError> {
        Ok(self.pause.read().clone())
    }

    async fn save_pause(&self, pause: &PauseRecord) -> Result<(), StoreError> {
        *self.pause.write() = Some(pause.clone());
        Ok(())
    }

    async fn clear_pause(&self) -> Result<bool, StoreError> {
        Ok(self.pause.write().take().is_some())
    }
}

/// In-memory implementation of `DecisionLogPort`.
#[derive(Debug, Default)]
pub struct InMemoryDecisionLog {
    entries: RwLock<Vec<DecisionLogEntry>>,
}

impl InMemoryDecisionLog {
    /// Create a new empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<DecisionLogEntry> {
        self.entries.read().clone()
    }
}

#[async_trait]
impl DecisionLogPort for InMemoryDecisionLog {
    async fn record(&self, entry: &DecisionLogEntry) -> Result<(), StoreError> {
        self.entries.write().push(entry.clone());
        Ok(())
    }

    async fn entries_for_run(&self, run_id: Uuid) -> Result<Vec<DecisionLogEntry>, StoreError> {
        Ok(self
            .entries
            .read()
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    use super::*;
    use crate::domain::shared::DateRange;

    fn bar(minute: u32) -> CanonicalRecord {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 14, minute, 0).unwrap();
        CanonicalRecord {
            symbol: Symbol::new("AAPL"),
            timestamp: ts,
            interval_end: ts + chrono::TimeDelta::minutes(1),
            open: dec!(100),
            high: dec!(101),
            low: dec!(99),
            close: dec!(100.5),
            volume: 1_000,
        }
    }

    #[tokio::test]
    async fn upsert_counts_inserts_and_updates() {
        let store = InMemoryRecordStore::new();
        let first = store.upsert_batch(&[bar(30), bar(31)]).await.unwrap();
        assert_eq!(first, LoadResult { inserted: 2, updated: 0 });

        let second = store.upsert_batch(&[bar(31), bar(32)]).await.unwrap();
        assert_eq!(second, LoadResult { inserted: 1, updated: 1 });
        assert_eq!(store.count().await.unwrap(), 3);
        assert_eq!(
            store.latest_timestamp(&Symbol::new("AAPL")).await.unwrap(),
            Some(bar(32).timestamp)
        );
    }

    #[tokio::test]
    async fn offline_store_reports_connection_error() {
        let store = InMemoryRecordStore::new();
        store.set_available(false);
        let err = store.upsert_batch(&[bar(30)]).await.unwrap_err();
        assert!(matches!(err, StoreError::Connection { .. }));
        assert_eq!(store.upsert_calls(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn checkpoint_history_tracks_every_save() {
        let store = InMemoryCheckpointStore::new();
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let key = UnitKey::new(Symbol::new("AAPL"), DateRange::new(day, day).unwrap());

        let mut checkpoint = Checkpoint::pending(key.clone(), 0);
        store.save(&checkpoint).await.unwrap();
        checkpoint.start(Utc::now()).unwrap();
        store.save(&checkpoint).await.unwrap();

        assert_eq!(
            store.history_for(&key),
            vec![CheckpointStatus::Pending, CheckpointStatus::InProgress]
        );
        assert_eq!(store.get(&key).unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn pause_flag_round_trip() {
        let store = InMemoryCheckpointStore::new();
        assert!(!store.clear_pause().await.unwrap());

        let pause = PauseRecord {
            reason: "database unreachable".to_string(),
            paused_at: Utc::now(),
            run_id: Uuid::new_v4(),
        };
        store.save_pause(&pause).await.unwrap();
        assert_eq!(store.load_pause().await.unwrap(), Some(pause));
        assert!(store.clear_pause().await.unwrap());
        assert!(store.load_pause().await.unwrap().is_none());
    }
}
