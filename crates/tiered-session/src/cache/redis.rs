//! Redis cache backend (feature-gated).

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use tiered_session_core::{CacheError, SessionCache};

/// Redis-backed cache.
///
/// Uses a `ConnectionManager`, which reconnects on its own; a dropped
/// connection surfaces as [`CacheError::Unavailable`] for the operations that
/// hit it.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to a Redis server.
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url).map_err(unavailable)?;
        let manager = ConnectionManager::new(client).await.map_err(unavailable)?;
        Ok(Self { manager })
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_manager(manager: ConnectionManager) -> Self {
        Self { manager }
    }
}

fn unavailable(e: RedisError) -> CacheError {
    CacheError::Unavailable(e.to_string())
}

// Redis rejects EX 0.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl SessionCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.manager.clone();
        let value: Option<Vec<u8>> = conn.get(key).await.map_err(unavailable)?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let () = conn
            .set_ex(key, &value[..], ttl_secs(ttl))
            .await
            .map_err(unavailable)?;
        Ok(true)
    }

    async fn replace(&self, key: &str, value: Bytes, ttl: Duration) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        // SET .. XX replies nil when the key does not exist
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(&value[..])
            .arg("EX")
            .arg(ttl_secs(ttl))
            .arg("XX")
            .query_async(&mut conn)
            .await
            .map_err(unavailable)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.del(key).await.map_err(unavailable)?;
        Ok(removed > 0)
    }
}
