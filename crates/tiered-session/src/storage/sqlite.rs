//! SQLite durable store (feature-gated).

use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sqlx::{
    Row,
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow},
};
use tiered_session_core::{SessionRecord, SessionStore, StorageError};

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS session_records (
    id TEXT PRIMARY KEY NOT NULL,
    payload BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
)";

// Only the update time is indexed: it drives stale-record purging.
const CREATE_INDEX: &str = "CREATE INDEX IF NOT EXISTS idx_session_records_updated_at
    ON session_records (updated_at)";

const SELECT_BY_ID: &str =
    "SELECT id, payload, created_at, updated_at FROM session_records WHERE id = ?1";

const UPSERT: &str = "INSERT INTO session_records (id, payload, created_at, updated_at)
    VALUES (?1, ?2, ?3, ?3)
    ON CONFLICT (id) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at
    RETURNING id, payload, created_at, updated_at";

const DELETE_BY_ID: &str = "DELETE FROM session_records WHERE id = ?1";

const DELETE_STALE: &str = "DELETE FROM session_records WHERE updated_at < ?1";

/// SQLite storage implementation.
///
/// Timestamps are stored as unix milliseconds.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a database and create the schema if needed.
    ///
    /// # Errors
    /// Returns error if database connection or migration fails.
    pub async fn new(database_url: &str) -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(unavailable)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Private in-memory database on a single pinned connection.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened.
    pub async fn in_memory() -> Result<Self, StorageError> {
        // Every connection to :memory: is a separate database, so keep
        // exactly one alive for the lifetime of the pool.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(unavailable)?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool. Call [`Self::migrate`] before use.
    #[must_use]
    pub const fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create the table and index if they do not exist.
    ///
    /// # Errors
    /// Returns error if the schema statements fail.
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        sqlx::query(CREATE_INDEX)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}

fn unavailable(e: sqlx::Error) -> StorageError {
    StorageError::Unavailable(e.to_string())
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| StorageError::Internal(format!("Invalid timestamp: {millis}")))
}

fn record_from_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    let id: String = row.try_get("id").map_err(unavailable)?;
    let payload: Vec<u8> = row.try_get("payload").map_err(unavailable)?;
    let created_at: i64 = row.try_get("created_at").map_err(unavailable)?;
    let updated_at: i64 = row.try_get("updated_at").map_err(unavailable)?;

    Ok(SessionRecord {
        id,
        payload: Bytes::from(payload),
        created_at: from_millis(created_at)?,
        updated_at: from_millis(updated_at)?,
    })
}

#[async_trait]
impl SessionStore for SqliteStore {
    async fn fetch(&self, id: &str) -> Result<Option<SessionRecord>, StorageError> {
        let row = sqlx::query(SELECT_BY_ID)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query(UPSERT)
            .bind(&record.id)
            .bind(&record.payload[..])
            .bind(Utc::now().timestamp_millis())
            .fetch_one(&self.pool)
            .await
            .map_err(unavailable)?;

        record_from_row(&row)
    }

    async fn delete(&self, record: &SessionRecord) -> Result<(), StorageError> {
        sqlx::query(DELETE_BY_ID)
            .bind(&record.id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let result = sqlx::query(DELETE_STALE)
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(result.rows_affected())
    }
}
