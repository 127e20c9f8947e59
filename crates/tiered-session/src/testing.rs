//! Recording fakes for exercising the coordinator.

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tiered_session_core::{CacheError, SessionCache, SessionRecord, SessionStore, StorageError};
use tracing::{Event, Level, Subscriber, subscriber::DefaultGuard};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheCall {
    Get(String),
    Set(String, Bytes, Duration),
    Replace(String, Bytes, Duration),
    Delete(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch(String),
    Upsert(String),
    Delete(String),
    Purge,
}

/// Cache holding entries in a map, logging every call.
#[derive(Default)]
pub struct FakeCache {
    entries: Mutex<HashMap<String, Bytes>>,
    calls: Mutex<Vec<CacheCall>>,
    failing: AtomicBool,
}

impl FakeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(self, key: &str, value: &'static str) -> Self {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), Bytes::from_static(value.as_bytes()));
        self
    }

    /// Make every subsequent call fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<CacheCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn entry(&self, key: &str) -> Option<Bytes> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn log(&self, call: CacheCall) -> Result<(), CacheError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(CacheError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionCache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.log(CacheCall::Get(key.to_string()))?;
        Ok(self.entry(key))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        self.log(CacheCall::Set(key.to_string(), value.clone(), ttl))?;
        self.entries.lock().unwrap().insert(key.to_string(), value);
        Ok(true)
    }

    async fn replace(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        self.log(CacheCall::Replace(key.to_string(), value.clone(), ttl))?;
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(key) {
            entries.insert(key.to_string(), value);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.log(CacheCall::Delete(key.to_string()))?;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }
}

/// Store holding records in a map, logging every call.
#[derive(Default)]
pub struct FakeStore {
    records: Mutex<HashMap<String, SessionRecord>>,
    calls: Mutex<Vec<StoreCall>>,
    failing: AtomicBool,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, id: &str, payload: &'static str) -> Self {
        self.records.lock().unwrap().insert(
            id.to_string(),
            SessionRecord::new(id, Bytes::from_static(payload.as_bytes())),
        );
        self
    }

    /// Make every subsequent call fail.
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn record(&self, id: &str) -> Option<SessionRecord> {
        self.records.lock().unwrap().get(id).cloned()
    }

    pub fn set_created_at(&self, id: &str, created_at: DateTime<Utc>) {
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.created_at = created_at;
        }
    }

    pub fn set_updated_at(&self, id: &str, updated_at: DateTime<Utc>) {
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.updated_at = updated_at;
        }
    }

    fn log(&self, call: StoreCall) -> Result<(), StorageError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable("deadline exceeded".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FakeStore {
    async fn fetch(&self, id: &str) -> Result<Option<SessionRecord>, StorageError> {
        self.log(StoreCall::Fetch(id.to_string()))?;
        Ok(self.record(id))
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<SessionRecord, StorageError> {
        self.log(StoreCall::Upsert(record.id.clone()))?;
        let now = Utc::now();
        let mut records = self.records.lock().unwrap();
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
        self.log(StoreCall::Delete(record.id.clone()))?;
        self.records.lock().unwrap().remove(&record.id);
        Ok(())
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.log(StoreCall::Purge)?;
        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|_, record| !record.is_stale(cutoff));
        Ok((before - records.len()) as u64)
    }
}

struct WarnCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Count warnings emitted on this thread while the guard is alive.
pub fn count_warnings() -> (Arc<AtomicUsize>, DefaultGuard) {
    let counter = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(WarnCounter(Arc::clone(&counter)));
    (counter, tracing::subscriber::set_default(subscriber))
}
