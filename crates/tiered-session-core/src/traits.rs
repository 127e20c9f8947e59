//! Capability traits for the cache tier and the durable tier.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::SessionRecord;

/// Cache tier error.
///
/// Every failure of a cache backend collapses into this one kind: the
/// coordinator treats an unavailable cache exactly like a miss.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),
}

/// Durable tier error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Storage error: {0}")]
    Internal(String),
}

/// Trait for cache backends (fast, volatile, TTL based).
///
/// A miss is `Ok(None)`, never an error. Entries may vanish at any time
/// through eviction or expiry.
#[async_trait]
pub trait SessionCache: Send + Sync {
    /// Get the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    /// Store `value` under `key`, creating or overwriting it.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError>;

    /// Overwrite `key` only if it already exists.
    ///
    /// Returns `Ok(false)` when the key was absent.
    async fn replace(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError>;

    /// Delete `key`. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;
}

/// Trait for durable session storage, keyed by session identifier.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Point lookup by identity. Not-found is `Ok(None)`.
    async fn fetch(&self, id: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Create or replace a record.
    ///
    /// Implementations set `updated_at` to the current time on every call and
    /// keep the stored `created_at` when the record already exists. Returns
    /// the record as stored.
    async fn upsert(&self, record: &SessionRecord) -> Result<SessionRecord, StorageError>;

    /// Delete a record. Deleting a missing record succeeds.
    async fn delete(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Delete every record last updated before `cutoff`, returning the count.
    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
