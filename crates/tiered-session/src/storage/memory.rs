//! In-memory durable store.

use std::{collections::HashMap, sync::RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tiered_session_core::{SessionRecord, SessionStore, StorageError};

/// In-memory storage implementation.
///
/// Useful for development and single-process deployments.
/// Data is lost on restart.
pub struct MemoryStore {
    records: RwLock<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    /// Create a new in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().map_or(0, |records| records.len())
    }

    /// Whether the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn fetch(&self, id: &str) -> Result<Option<SessionRecord>, StorageError> {
        Ok(self
            .records
            .read()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .get(id)
            .cloned())
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<SessionRecord, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let now = Utc::now();
        let created_at = records
            .get(&record.id)
            .map_or(now, |existing| existing.created_at);

        let stored = SessionRecord {
            id: record.id.clone(),
            payload: record.payload.clone(),
            created_at,
            updated_at: now,
        };
        records.insert(record.id.clone(), stored.clone());

        Ok(stored)
    }

    async fn delete(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?
            .remove(&record.id);

        Ok(())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut records = self
            .records
            .write()
            .map_err(|e| StorageError::Internal(e.to_string()))?;

        let before = records.len();
        records.retain(|_, record| !record.is_stale(cutoff));

        Ok((before - records.len()) as u64)
    }
}
