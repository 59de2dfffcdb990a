//! SQLite persistence via `SQLx`.
//!
//! One pool backs the record table, the ticker list, checkpoints, the pause
//! flag and the decision log. Timestamps are stored as fixed-width RFC 3339
//! UTC text with nanosecond precision so that lexical order matches time
//! order and distinct instants never share a key; prices are stored as
//! decimal text to avoid float rounding.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::application::ports::{
    CheckpointStorePort, DecisionLogPort, LoadResult, RecordStorePort, StoreError,
};
use crate::domain::failure::{DecisionCategory, DecisionLogEntry, RetryAction, Stage};
use crate::domain::market_data::CanonicalRecord;
use crate::domain::shared::{DateRange, Symbol};
use crate::domain::work::{Checkpoint, CheckpointStatus, PauseRecord, UnitKey};
use crate::resilience::RetryPolicy;

const SCHEMA: &[&str] = &[
    r"
    CREATE TABLE IF NOT EXISTS market_bars (
        symbol        TEXT    NOT NULL,
        ts            TEXT    NOT NULL,
        interval_end  TEXT    NOT NULL,
        open          TEXT    NOT NULL,
        high          TEXT    NOT NULL,
        low           TEXT    NOT NULL,
        close         TEXT    NOT NULL,
        volume        INTEGER NOT NULL,
        loaded_at     TEXT    NOT NULL,
        PRIMARY KEY (symbol, ts)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS tickers (
        symbol    TEXT PRIMARY KEY,
        added_at  TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS checkpoints (
        symbol           TEXT    NOT NULL,
        start_date       TEXT    NOT NULL,
        end_date         TEXT    NOT NULL,
        status           TEXT    NOT NULL,
        last_attempt_at  TEXT,
        error_summary    TEXT,
        attempts         INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (symbol, start_date, end_date)
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS pipeline_pause (
        id         INTEGER PRIMARY KEY CHECK (id = 1),
        reason     TEXT NOT NULL,
        paused_at  TEXT NOT NULL,
        run_id     TEXT NOT NULL
    )
    ",
    r"
    CREATE TABLE IF NOT EXISTS decision_log (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id         TEXT    NOT NULL,
        symbol         TEXT    NOT NULL,
        start_date     TEXT    NOT NULL,
        end_date       TEXT    NOT NULL,
        stage          TEXT    NOT NULL,
        category       TEXT    NOT NULL,
        action         TEXT    NOT NULL,
        attempt_count  INTEGER NOT NULL,
        reason         TEXT    NOT NULL,
        recorded_at    TEXT    NOT NULL
    )
    ",
    "CREATE INDEX IF NOT EXISTS decision_log_run ON decision_log (run_id)",
];

/// Connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteStoreConfig {
    /// `sqlite://path/to/file.db` style URL.
    pub database_url: String,
    /// Pool size.
    pub max_connections: u32,
    /// How long to wait for a pooled connection.
    pub acquire_timeout: Duration,
    /// How long SQLite waits on a locked database.
    pub busy_timeout: Duration,
}

/// SQLite-backed store implementing every persistence port.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database and apply the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the database cannot be
    /// opened, or the schema cannot be applied.
    pub async fn connect(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(map_sqlx_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(config.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await
            .map_err(map_sqlx_error)?;

        let store = Self::with_pool(pool);
        store.migrate().await?;

        info!(
            url = %config.database_url,
            max_connections = config.max_connections,
            "SQLite store initialized"
        );
        Ok(store)
    }

    /// [`SqliteStore::connect`], retried on connection errors.
    ///
    /// Waits follow the `connectivity_lost` schedule of `policy`: a fixed
    /// delay between attempts and at most `max_retries` reconnects. Other
    /// errors, such as a malformed URL, are returned at once.
    ///
    /// # Errors
    ///
    /// Returns the last error once retries are spent, or the first
    /// non-connection error.
    pub async fn connect_with_retry(
        config: &SqliteStoreConfig,
        policy: &RetryPolicy,
    ) -> Result<Self, StoreError> {
        let mut attempt = 0;
        loop {
            let err = match Self::connect(config).await {
                Ok(store) => return Ok(store),
                Err(err @ StoreError::Connection { .. }) => err,
                Err(err) => return Err(err),
            };

            let Some(delay) = policy.reconnect_delay(attempt) else {
                warn!(attempts = attempt + 1, error = %err, "database unreachable, giving up");
                return Err(err);
            };
            attempt += 1;
            warn!(
                attempt,
                delay_ms = delay.as_millis(),
                error = %err,
                "database unreachable, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Wrap an existing pool (schema not applied).
    #[must_use]
    pub const fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create tables and indexes if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }
        Ok(())
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStorePort for SqliteStore {
    async fn upsert_batch(&self, records: &[CanonicalRecord]) -> Result<LoadResult, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let loaded_at = format_ts(Utc::now());
        let mut result = LoadResult::default();

        for record in records {
            let ts = format_ts(record.timestamp);
            let exists = sqlx::query("SELECT 1 FROM market_bars WHERE symbol = ?1 AND ts = ?2")
                .bind(record.symbol.as_str())
                .bind(&ts)
                .fetch_optional(&mut *tx)
                .await
                .map_err(map_sqlx_error)?
                .is_some();

            let volume = i64::try_from(record.volume).map_err(|_| StoreError::Query {
                message: format!("volume {} out of range", record.volume),
            })?;

            sqlx::query(
                r"
                INSERT INTO market_bars (symbol, ts, interval_end, open, high, low, close, volume, loaded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                ON CONFLICT (symbol, ts) DO UPDATE SET
                    interval_end = EXCLUDED.interval_end,
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume,
                    loaded_at = EXCLUDED.loaded_at
                ",
            )
            .bind(record.symbol.as_str())
            .bind(&ts)
            .bind(format_ts(record.interval_end))
            .bind(record.open.to_string())
            .bind(record.high.to_string())
            .bind(record.low.to_string())
            .bind(record.close.to_string())
            .bind(volume)
            .bind(&loaded_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

            if exists {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        debug!(inserted = result.inserted, updated = result.updated, "market bars upserted");
        Ok(result)
    }

    async fn latest_timestamp(&self, symbol: &Symbol) -> Result<Option<DateTime<Utc>>, StoreError> {
        let latest: Option<String> =
            sqlx::query_scalar("SELECT MAX(ts) FROM market_bars WHERE symbol = ?1")
                .bind(symbol.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        latest.as_deref().map(parse_ts).transpose()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_bars")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn add_tickers(&self, symbols: &[Symbol]) -> Result<u64, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let added_at = format_ts(Utc::now());
        let mut added = 0;

        for symbol in symbols {
            let result = sqlx::query(
                "INSERT INTO tickers (symbol, added_at) VALUES (?1, ?2) ON CONFLICT (symbol) DO NOTHING",
            )
            .bind(symbol.as_str())
            .bind(&added_at)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
            added += result.rows_affected();
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(added)
    }

    async fn tickers(&self) -> Result<Vec<Symbol>, StoreError> {
        let symbols: Vec<String> = sqlx::query_scalar("SELECT symbol FROM tickers ORDER BY symbol")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(symbols.into_iter().map(Symbol::new).collect())
    }

    async fn records_for(&self, symbol: &Symbol) -> Result<Vec<CanonicalRecord>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT symbol, ts, interval_end, open, high, low, close, volume
            FROM market_bars
            WHERE symbol = ?1
            ORDER BY ts
            ",
        )
        .bind(symbol.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }
}

#[async_trait]
impl CheckpointStorePort for SqliteStore {
    async fn load_all(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT symbol, start_date, end_date, status, last_attempt_at, error_summary, attempts
            FROM checkpoints
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(checkpoint_from_row).collect()
    }

    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO checkpoints (symbol, start_date, end_date, status, last_attempt_at, error_summary, attempts)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT (symbol, start_date, end_date) DO UPDATE SET
                status = EXCLUDED.status,
                last_attempt_at = EXCLUDED.last_attempt_at,
                error_summary = EXCLUDED.error_summary,
                attempts = EXCLUDED.attempts
            ",
        )
        .bind(checkpoint.key.symbol.as_str())
        .bind(checkpoint.key.range.start().to_string())
        .bind(checkpoint.key.range.end().to_string())
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.last_attempt_at.map(format_ts))
        .bind(checkpoint.error_summary.as_deref())
        .bind(i64::from(checkpoint.attempts))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(unit = %checkpoint.key, status = %checkpoint.status, "checkpoint saved");
        Ok(())
    }

    async fn load_pause(&self) -> Result<Option<PauseRecord>, StoreError> {
        let row = sqlx::query("SELECT reason, paused_at, run_id FROM pipeline_pause WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(|row| {
            Ok(PauseRecord {
                reason: get(&row, "reason")?,
                paused_at: parse_ts(&get::<String>(&row, "paused_at")?)?,
                run_id: parse_uuid(&get::<String>(&row, "run_id")?)?,
            })
        })
        .transpose()
    }

    async fn save_pause(&self, pause: &PauseRecord) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO pipeline_pause (id, reason, paused_at, run_id)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT (id) DO UPDATE SET
                reason = EXCLUDED.reason,
                paused_at = EXCLUDED.paused_at,
                run_id = EXCLUDED.run_id
            ",
        )
        .bind(&pause.reason)
        .bind(format_ts(pause.paused_at))
        .bind(pause.run_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn clear_pause(&self) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM pipeline_pause WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl DecisionLogPort for SqliteStore {
    async fn record(&self, entry: &DecisionLogEntry) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO decision_log (
                run_id, symbol, start_date, end_date, stage, category,
                action, attempt_count, reason, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ",
        )
        .bind(entry.run_id.to_string())
        .bind(entry.unit_key.symbol.as_str())
        .bind(entry.unit_key.range.start().to_string())
        .bind(entry.unit_key.range.end().to_string())
        .bind(entry.stage.as_str())
        .bind(entry.category.as_str())
        .bind(entry.action.as_str())
        .bind(i64::from(entry.attempt_count))
        .bind(&entry.reason)
        .bind(format_ts(entry.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn entries_for_run(&self, run_id: Uuid) -> Result<Vec<DecisionLogEntry>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT run_id, symbol, start_date, end_date, stage, category,
                   action, attempt_count, reason, recorded_at
            FROM decision_log
            WHERE run_id = ?1
            ORDER BY id
            ",
        )
        .bind(run_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.iter().map(decision_from_row).collect()
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => StoreError::Connection {
            message: err.to_string(),
        },
        sqlx::Error::Database(ref db) if is_busy(db.code().as_deref(), db.message()) => {
            StoreError::Connection {
                message: err.to_string(),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Corrupt {
                message: err.to_string(),
            }
        }
        other => StoreError::Query {
            message: other.to_string(),
        },
    }
}

/// `SQLITE_BUSY` (5), `SQLITE_LOCKED` (6) and `SQLITE_CANTOPEN` (14) clear up on their own.
/// Extended codes carry the primary code in the low byte.
fn is_busy(code: Option<&str>, message: &str) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .is_some_and(|c| matches!(c & 0xff, 5 | 6 | 14))
        || message.contains("database is locked")
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| corrupt(format!("timestamp '{value}': {e}")))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::from_str(value).map_err(|e| corrupt(format!("date '{value}': {e}")))
}

fn parse_decimal(value: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(value).map_err(|e| corrupt(format!("decimal '{value}': {e}")))
}

fn parse_uuid(value: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(value).map_err(|e| corrupt(format!("run id '{value}': {e}")))
}

fn corrupt(message: String) -> StoreError {
    StoreError::Corrupt { message }
}

fn get<'r, T>(row: &'r SqliteRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(column).map_err(map_sqlx_error)
}

fn unit_key_from_row(row: &SqliteRow) -> Result<UnitKey, StoreError> {
    let start = parse_date(&get::<String>(row, "start_date")?)?;
    let end = parse_date(&get::<String>(row, "end_date")?)?;
    let range = DateRange::new(start, end).map_err(|e| corrupt(e.to_string()))?;
    Ok(UnitKey::new(Symbol::new(get::<String>(row, "symbol")?), range))
}

fn record_from_row(row: &SqliteRow) -> Result<CanonicalRecord, StoreError> {
    let volume: i64 = get(row, "volume")?;
    Ok(CanonicalRecord {
        symbol: Symbol::new(get::<String>(row, "symbol")?),
        timestamp: parse_ts(&get::<String>(row, "ts")?)?,
        interval_end: parse_ts(&get::<String>(row, "interval_end")?)?,
        open: parse_decimal(&get::<String>(row, "open")?)?,
        high: parse_decimal(&get::<String>(row, "high")?)?,
        low: parse_decimal(&get::<String>(row, "low")?)?,
        close: parse_decimal(&get::<String>(row, "close")?)?,
        volume: u64::try_from(volume).map_err(|_| corrupt(format!("negative volume {volume}")))?,
    })
}

fn checkpoint_from_row(row: &SqliteRow) -> Result<Checkpoint, StoreError> {
    let status: String = get(row, "status")?;
    let last_attempt_at: Option<String> = get(row, "last_attempt_at")?;
    let attempts: i64 = get(row, "attempts")?;
    Ok(Checkpoint {
        key: unit_key_from_row(row)?,
        status: CheckpointStatus::from_str(&status).map_err(|e| corrupt(e.to_string()))?,
        last_attempt_at: last_attempt_at.as_deref().map(parse_ts).transpose()?,
        error_summary: get(row, "error_summary")?,
        attempts: u32::try_from(attempts).unwrap_or_default(),
    })
}

fn decision_from_row(row: &SqliteRow) -> Result<DecisionLogEntry, StoreError> {
    let stage: String = get(row, "stage")?;
    let category: String = get(row, "category")?;
    let action: String = get(row, "action")?;
    let attempt_count: i64 = get(row, "attempt_count")?;

    Ok(DecisionLogEntry {
        run_id: parse_uuid(&get::<String>(row, "run_id")?)?,
        unit_key: unit_key_from_row(row)?,
        stage: match stage.as_str() {
            "extract" => Stage::Extract,
            "transform" => Stage::Transform,
            "load" => Stage::Load,
            other => return Err(corrupt(format!("stage '{other}'"))),
        },
        category: DecisionCategory::from_label(&category)
            .ok_or_else(|| corrupt(format!("category '{category}'")))?,
        action: match action.as_str() {
            "retry" => RetryAction::Retry,
            "escalate" => RetryAction::Escalate,
            "abort" => RetryAction::Abort,
            other => return Err(corrupt(format!("action '{other}'"))),
        },
        attempt_count: u32::try_from(attempt_count).unwrap_or_default(),
        reason: get(row, "reason")?,
        recorded_at: parse_ts(&get::<String>(row, "recorded_at")?)?,
    })
}
