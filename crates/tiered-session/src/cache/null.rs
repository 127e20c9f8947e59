//! Sentinel cache used when no cache backend is configured.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tiered_session_core::{CacheError, SessionCache};

/// Cache that never holds anything.
///
/// Every lookup misses and every write is accepted and dropped, so the
/// coordinator always falls through to the durable store.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCache;

#[async_trait]
impl SessionCache for NullCache {
    async fn get(&self, _key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<bool, CacheError> {
        Ok(true)
    }

    async fn replace(&self, _key: &str, _value: Bytes, _ttl: Duration) -> Result<bool, CacheError> {
        Ok(true)
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Ok(false)
    }
}
