//! In-process cache with LRU eviction and per-entry TTL.

use std::{
    num::NonZeroUsize,
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use tiered_session_core::{CacheError, SessionCache};

/// Default maximum number of cached sessions.
pub const DEFAULT_CAPACITY: usize = 10_000;

#[derive(Debug)]
struct CachedValue {
    value: Bytes,
    /// `None` when the TTL runs past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl CachedValue {
    fn new(value: Bytes, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

/// In-memory cache implementation.
///
/// Useful for single-process deployments and tests. Expired entries are
/// dropped lazily on access; the least recently used entry is evicted once
/// `capacity` is reached.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, CachedValue>>,
}

impl MemoryCache {
    /// Create a cache with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, LruCache<String, CachedValue>>, CacheError> {
        self.entries
            .lock()
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        let value = entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());
        if value.is_none() {
            entries.pop(key);
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        self.lock()?
            .put(key.to_string(), CachedValue::new(value, ttl));
        Ok(true)
    }

    async fn replace(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        if entries.peek(key).is_some_and(|entry| entry.is_live(now)) {
            entries.put(key.to_string(), CachedValue::new(value, ttl));
            Ok(true)
        } else {
            entries.pop(key);
            Ok(false)
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .pop(key)
            .is_some_and(|entry| entry.is_live(now)))
    }
}
