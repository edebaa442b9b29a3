pub mod account_store;
pub mod batch;
pub mod bet_store;
pub mod history_store;
pub mod jackpot_store;
pub mod round_store;

pub use account_store::AccountStore;
pub use batch::{Write, WriteBatch};
pub use bet_store::BetStore;
pub use history_store::HistoryStore;
pub use jackpot_store::JackpotStore;
pub use round_store::{LockOutcome, RoundStore};

use crate::config::RetryPolicy;
use crate::error::{Result, StoreError, TransactionError};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::path::Path;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
    last_timestamp: parking_lot::Mutex<i64>,
}

/// An open read/write transaction handed to [`Storage::transaction`] callbacks.
pub struct Txn<'c> {
    tx: rusqlite::Transaction<'c>,
    now: DateTime<Utc>,
}

impl<'c> Txn<'c> {
    /// Server timestamp assigned to this transaction attempt.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.tx
    }
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let conn = Connection::open(db_path)?;
        Self::from_connection(conn).await
    }

    pub async fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
            retry: RetryPolicy::default(),
            last_timestamp: parking_lot::Mutex::new(0),
        };

        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                balance INTEGER NOT NULL CHECK (balance >= 0),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rounds (
                id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                result TEXT,
                jackpot_seed INTEGER NOT NULL CHECK (jackpot_seed >= 0),
                started_at INTEGER NOT NULL,
                ended_at INTEGER,
                epoch INTEGER NOT NULL,
                claim INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS bets (
                round_id TEXT NOT NULL,
                account_id TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                stakes TEXT NOT NULL,
                total_stake INTEGER NOT NULL CHECK (total_stake > 0),
                placed_at INTEGER NOT NULL,
                PRIMARY KEY (round_id, account_id)
            );

            CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                round_id TEXT NOT NULL,
                epoch INTEGER NOT NULL,
                result TEXT NOT NULL,
                settled_at INTEGER NOT NULL,
                UNIQUE (round_id, epoch)
            );

            CREATE TABLE IF NOT EXISTS jackpot (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                value INTEGER NOT NULL CHECK (value >= 0)
            );",
        )?;

        Ok(())
    }

    /// Monotonic server timestamp, strictly increasing at millisecond resolution.
    pub fn now(&self) -> DateTime<Utc> {
        let mut last = self.last_timestamp.lock();
        let millis = Utc::now().timestamp_millis().max(*last + 1);
        *last = millis;
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }

    /// Run `f` inside an immediate transaction.
    ///
    /// `Ok` commits every write `f` made, `Err` rolls all of them back. Transient store
    /// errors (busy or locked database) re-run `f` from scratch with a fresh timestamp,
    /// up to the retry policy's limit, after which [`StoreError::Unavailable`] is
    /// returned. `f` must therefore not have side effects outside the transaction.
    pub async fn transaction<T, E, F>(&self, mut f: F) -> std::result::Result<T, E>
    where
        F: FnMut(&Txn<'_>) -> std::result::Result<T, E>,
        E: TransactionError,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = {
                let mut conn = self.conn.lock().await;
                let now = self.now();
                run_transaction(&mut conn, now, &mut f)
            };

            match outcome {
                Err(e) if e.is_transient() => {
                    if attempt >= self.retry.max_attempts {
                        tracing::error!("Transaction gave up after {} attempts", attempt);
                        return Err(StoreError::Unavailable { attempts: attempt }.into());
                    }
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        "Transaction conflict on attempt {}, retrying in {:?}",
                        attempt,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    /// Commit every write in `batch` atomically, returning the commit timestamp.
    pub async fn commit(&self, batch: WriteBatch) -> Result<DateTime<Utc>> {
        if batch.is_empty() {
            return Ok(self.now());
        }

        let size = batch.len();
        let committed_at = self
            .transaction(|txn| {
                batch.apply(txn)?;
                Ok::<_, StoreError>(txn.now())
            })
            .await?;

        tracing::debug!("Committed batch of {} writes", size);
        Ok(committed_at)
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

fn run_transaction<T, E, F>(
    conn: &mut Connection,
    now: DateTime<Utc>,
    f: &mut F,
) -> std::result::Result<T, E>
where
    F: FnMut(&Txn<'_>) -> std::result::Result<T, E>,
    E: TransactionError,
{
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(StoreError::from)?;
    let txn = Txn { tx, now };

    // Dropping `txn` on the error path rolls back.
    let value = f(&txn)?;
    txn.tx.commit().map_err(StoreError::from)?;
    Ok(value)
}

pub(crate) fn to_sql_amount(amount: u64) -> Result<i64> {
    i64::try_from(amount)
        .map_err(|_| StoreError::internal(format!("Amount {} exceeds storage range", amount)))
}

pub(crate) fn amount_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let raw: i64 = row.get(idx)?;
    u64::try_from(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

pub(crate) fn timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    millis_to_datetime(idx, millis)
}

pub(crate) fn optional_timestamp_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let millis: Option<i64> = row.get(idx)?;
    millis.map(|m| millis_to_datetime(idx, m)).transpose()
}

fn millis_to_datetime(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            format!("timestamp out of range: {}", millis).into(),
        )
    })
}

/// Map a text column through `FromStr`, reporting failures as conversion errors.
pub(crate) fn parsed_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: T::Err| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.to_string().into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_timestamps_are_strictly_increasing() {
        let storage = Storage::in_memory().await.unwrap();
        let mut previous = storage.now();
        for _ in 0..100 {
            let next = storage.now();
            assert!(next > previous);
            previous = next;
        }
    }

    #[tokio::test]
    async fn test_failed_transaction_rolls_back() {
        let storage = Storage::in_memory().await.unwrap();
        let accounts = AccountStore::new(&storage);
        accounts.create("alice", 100).await.unwrap();

        let result: Result<()> = storage
            .transaction(|txn| {
                AccountStore::increment_in(txn, "alice", -40)?;
                Err(StoreError::internal("abort"))
            })
            .await;
        assert!(result.is_err());

        let alice = accounts.get("alice").await.unwrap().unwrap();
        assert_eq!(alice.balance, 100);
    }

    #[tokio::test]
    async fn test_empty_batch_commits_nothing() {
        let storage = Storage::in_memory().await.unwrap();
        let before = storage.now();

        let committed_at = storage.commit(WriteBatch::new()).await.unwrap();
        assert!(committed_at > before);
        assert_eq!(JackpotStore::new(&storage).value().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_schema_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("doorbet.db");

        {
            let storage = Storage::new(&db_path).await.unwrap();
            AccountStore::new(&storage).create("bob", 5).await.unwrap();
        }

        let storage = Storage::new(&db_path).await.unwrap();
        let bob = AccountStore::new(&storage).get("bob").await.unwrap().unwrap();
        assert_eq!(bob.balance, 5);
    }
}
