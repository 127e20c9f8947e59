//! End-to-end request sequences against the in-memory backends.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tiered_session::{
    CacheError, KeyScheme, MemoryCache, MemoryStore, SessionCache, SessionConfig, SessionEngine,
    SessionRecord, SessionStore, StorageError, WriteOutcome,
};

/// Counts calls and forwards them to the wrapped backend.
struct Counted<T> {
    inner: T,
    calls: AtomicUsize,
    sets: AtomicUsize,
    upserts: AtomicUsize,
}

impl<T> Counted<T> {
    fn new(inner: T) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            sets: AtomicUsize::new(0),
            upserts: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.sets.store(0, Ordering::SeqCst);
        self.upserts.store(0, Ordering::SeqCst);
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<C: SessionCache> SessionCache for Counted<C> {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        self.tick();
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        self.tick();
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value, ttl).await
    }

    async fn replace(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        self.tick();
        self.inner.replace(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        self.tick();
        self.inner.delete(key).await
    }
}

#[async_trait]
impl<S: SessionStore> SessionStore for Counted<S> {
    async fn fetch(&self, id: &str) -> Result<Option<SessionRecord>, StorageError> {
        self.tick();
        self.inner.fetch(id).await
    }

    async fn upsert(&self, record: &SessionRecord) -> Result<SessionRecord, StorageError> {
        self.tick();
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(record).await
    }

    async fn delete(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.tick();
        self.inner.delete(record).await
    }

    async fn purge_stale(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.tick();
        self.inner.purge_stale(cutoff).await
    }
}

type Engine = SessionEngine<Counted<MemoryCache>, Counted<MemoryStore>>;

fn engine() -> (Engine, Arc<Counted<MemoryCache>>, Arc<Counted<MemoryStore>>) {
    let cache = Arc::new(Counted::new(MemoryCache::new()));
    let store = Arc::new(Counted::new(MemoryStore::new()));
    let config = SessionConfig::new()
        .with_duration(Duration::from_secs(3600))
        .with_keys(KeyScheme::new("ns", "v1"));
    let engine = SessionEngine::from_shared(Arc::clone(&cache), Arc::clone(&store), config);
    (engine, cache, store)
}

#[tokio::test]
async fn test_session_lifecycle_across_requests() {
    let (engine, cache, store) = engine();

    // Request 1: brand-new session, nothing stored anywhere
    let mut request = engine.coordinator();
    assert!(request.read("abc123").await.is_empty());
    assert!(request.is_new_session());
    assert_eq!(request.write("abc123", Bytes::new()).await, WriteOutcome::CachedNew);
    assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    assert_eq!(store.upserts.load(Ordering::SeqCst), 0);
    assert!(store.inner.is_empty());
    assert_eq!(
        cache.inner.get("ns:v1:abc123").await.unwrap(),
        Some(Bytes::new())
    );

    // Request 2: the cached empty session spares the store lookup
    store.reset();
    let mut request = engine.coordinator();
    assert!(request.read("abc123").await.is_empty());
    assert_eq!(store.calls(), 0);
    assert_eq!(
        request.write("abc123", Bytes::from_static(b"x=1")).await,
        WriteOutcome::Persisted
    );
    assert_eq!(store.upserts.load(Ordering::SeqCst), 1);
    let record = store.inner.fetch("abc123").await.unwrap().unwrap();
    assert_eq!(record.payload, Bytes::from_static(b"x=1"));
    assert_eq!(record.created_at, record.updated_at);

    // Request 3: unchanged payload, zero backend writes
    cache.reset();
    store.reset();
    let mut request = engine.coordinator();
    assert_eq!(request.read("abc123").await, Bytes::from_static(b"x=1"));
    cache.reset();
    assert_eq!(
        request.write("abc123", Bytes::from_static(b"x=1")).await,
        WriteOutcome::Unchanged
    );
    assert_eq!(cache.calls(), 0);
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_eviction_gap_is_repaired_by_backfill() {
    let (engine, cache, store) = engine();

    let mut request = engine.coordinator();
    request.read("abc123").await;
    request.write("abc123", Bytes::from_static(b"x=1")).await;

    // Simulate eviction
    cache.inner.delete("ns:v1:abc123").await.unwrap();

    store.reset();
    let mut request = engine.coordinator();
    assert_eq!(request.read("abc123").await, Bytes::from_static(b"x=1"));
    assert_eq!(store.calls(), 1);

    store.reset();
    let mut request = engine.coordinator();
    assert_eq!(request.read("abc123").await, Bytes::from_static(b"x=1"));
    assert_eq!(store.calls(), 0);
}

#[tokio::test]
async fn test_destroy_purges_both_tiers() {
    let (engine, _cache, store) = engine();

    let mut request = engine.coordinator();
    request.read("abc123").await;
    request.write("abc123", Bytes::from_static(b"x=1")).await;
    request.destroy("abc123").await;
    assert!(store.inner.is_empty());

    let mut request = engine.coordinator();
    assert!(request.read("abc123").await.is_empty());
    assert!(request.is_new_session());

    // Destroying again is harmless
    request.destroy("abc123").await;
}

#[tokio::test]
async fn test_garbage_collection_spares_recent_sessions() {
    let (engine, cache, _store) = engine();

    let mut request = engine.coordinator();
    request.read("abc123").await;
    request.write("abc123", Bytes::from_static(b"x=1")).await;

    cache.reset();
    let purged = engine
        .coordinator()
        .collect_garbage(Duration::from_secs(3600))
        .await;
    assert_eq!(purged, 0);
    assert_eq!(cache.calls(), 0);
}
