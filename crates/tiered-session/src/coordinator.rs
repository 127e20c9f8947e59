//! Per-request session coordinator: the read / write / destroy protocol
//! across the cache tier and the durable tier.
//!
//! No backend error ever escapes this module. A failing cache behaves like an
//! empty one, and a failing store degrades persistence to cache-only for the
//! operation that hit it. Each failure is logged once at warning level.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tiered_session_core::{SessionCache, SessionConfig, SessionRecord, SessionStore};
use tracing::{debug, trace, warn};

/// Protocol phase for one request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Nothing read yet.
    #[default]
    Unread,
    /// The payload has been located.
    ReadResolved,
    /// The last write matched what was read.
    Unchanged,
    /// The last write carried new data.
    Updated,
    /// The session read this request was destroyed.
    Destroyed,
}

/// What a [`SessionCoordinator::write`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Payload unchanged; no backend was touched.
    Unchanged,
    /// Payload unchanged on a new session; written to the cache only.
    CachedNew,
    /// Payload changed; written to the cache and persisted.
    Persisted,
    /// Payload changed but the store write failed; only the cache was updated.
    CacheOnly,
    /// The session was destroyed earlier in this request.
    Skipped,
}

#[derive(Debug, Default)]
struct CoordinatorState {
    session_id: Option<String>,
    last_observed: Bytes,
    is_new: bool,
    record: Option<SessionRecord>,
    phase: Phase,
}

/// Coordinates one request's view of a session across both tiers.
///
/// Created per request by [`crate::SessionEngine::coordinator`] and dropped
/// when the request ends. Not shared between requests.
pub struct SessionCoordinator<C: ?Sized, S: ?Sized> {
    cache: Arc<C>,
    store: Arc<S>,
    config: Arc<SessionConfig>,
    state: CoordinatorState,
}

impl<C, S> SessionCoordinator<C, S>
where
    C: SessionCache + ?Sized,
    S: SessionStore + ?Sized,
{
    /// Create a coordinator over shared backends.
    #[must_use]
    pub fn new(cache: Arc<C>, store: Arc<S>, config: Arc<SessionConfig>) -> Self {
        Self {
            cache,
            store,
            config,
            state: CoordinatorState::default(),
        }
    }

    /// Nothing to set up.
    #[must_use]
    pub const fn open(&self) -> bool {
        true
    }

    /// Nothing to tear down.
    #[must_use]
    pub const fn close(&self) -> bool {
        true
    }

    /// Current protocol phase.
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Whether both tiers reported the session absent at read time and
    /// nothing has been persisted since. False when the store lookup failed.
    #[must_use]
    pub const fn is_new_session(&self) -> bool {
        self.state.is_new
    }

    /// Payload the next write is compared against.
    #[must_use]
    pub const fn last_observed(&self) -> &Bytes {
        &self.state.last_observed
    }

    /// Durable record held for this request, if any.
    #[must_use]
    pub const fn record(&self) -> Option<&SessionRecord> {
        self.state.record.as_ref()
    }

    fn ttl(&self) -> Duration {
        self.config.duration
    }

    /// Locate the session payload, preferring the cache.
    ///
    /// Returns an empty payload for new or unknown sessions. Called once per
    /// request, before any write.
    pub async fn read(&mut self, id: &str) -> Bytes {
        let key = self.config.keys.cache_key(id);

        let cached = match self.cache.get(&key).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(session_id = %id, key = %key, error = %e, "Unable to read session from cache");
                None
            }
        };

        let payload = if let Some(payload) = cached {
            debug!(session_id = %id, "Session found in cache");
            self.state.is_new = false;
            self.state.record = None;
            payload
        } else {
            debug!(session_id = %id, "Session cache miss, trying store");
            self.read_from_store(id, &key).await
        };

        self.state.session_id = Some(id.to_string());
        self.state.last_observed = payload.clone();
        self.state.phase = Phase::ReadResolved;

        payload
    }

    async fn read_from_store(&mut self, id: &str, key: &str) -> Bytes {
        match self.store.fetch(self.config.keys.store_key(id)).await {
            Ok(Some(record)) => {
                let payload = record.payload.clone();
                self.state.is_new = false;
                self.state.record = Some(record);

                // Backfill so the next request is served from cache
                match self.cache.set(key, payload.clone(), self.ttl()).await {
                    Ok(_) => debug!(session_id = %id, "Session loaded from store, cache backfilled"),
                    Err(e) => {
                        warn!(session_id = %id, key = %key, error = %e, "Unable to backfill session cache");
                    }
                }

                payload
            }
            Ok(None) => {
                debug!(session_id = %id, "New session");
                self.state.is_new = true;
                self.state.record = None;
                Bytes::new()
            }
            Err(e) => {
                // Whether a record exists is unknown, so the session is not
                // new: an unchanged write must not cache over durable data.
                warn!(session_id = %id, error = %e, "Unable to read session from store");
                self.state.is_new = false;
                self.state.record = None;
                Bytes::new()
            }
        }
    }

    /// Write the session payload back, touching only the tiers that need it.
    pub async fn write(&mut self, id: &str, payload: Bytes) -> WriteOutcome {
        if self.state.phase == Phase::Destroyed && self.state.session_id.as_deref() == Some(id) {
            debug!(session_id = %id, "Session destroyed, skipping write");
            return WriteOutcome::Skipped;
        }

        if payload == self.state.last_observed {
            self.state.phase = Phase::Unchanged;
            if self.state.is_new {
                // Cache the empty session so later requests stop missing
                // through to the store before any data exists.
                self.cache_payload(id, payload).await;
                debug!(session_id = %id, "New session cached");
                return WriteOutcome::CachedNew;
            }
            trace!(session_id = %id, "Session unchanged");
            return WriteOutcome::Unchanged;
        }

        self.state.phase = Phase::Updated;
        self.cache_payload(id, payload.clone()).await;

        if self.persist(id, payload.clone()).await {
            self.state.last_observed = payload;
            debug!(session_id = %id, "Session persisted");
            WriteOutcome::Persisted
        } else {
            WriteOutcome::CacheOnly
        }
    }

    /// Replace first so an existing entry is refreshed, and only create the
    /// entry when the cache reports it absent.
    async fn cache_payload(&self, id: &str, payload: Bytes) {
        let key = self.config.keys.cache_key(id);
        let ttl = self.ttl();

        let result = match self.cache.replace(&key, payload.clone(), ttl).await {
            Ok(true) => Ok(true),
            Ok(false) => {
                trace!(key = %key, "Cache key absent, setting");
                self.cache.set(&key, payload, ttl).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(session_id = %id, key = %key, error = %e, "Unable to write session to cache");
        }
    }

    async fn persist(&mut self, id: &str, payload: Bytes) -> bool {
        let record = match &self.state.record {
            Some(existing) if existing.id == id => SessionRecord {
                payload,
                ..existing.clone()
            },
            _ => SessionRecord::new(self.config.keys.store_key(id), payload),
        };

        match self.store.upsert(&record).await {
            Ok(stored) => {
                self.state.record = Some(stored);
                self.state.is_new = false;
                true
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Unable to write session to store");
                false
            }
        }
    }

    /// Remove a session from both tiers. Idempotent.
    pub async fn destroy(&mut self, id: &str) {
        match self.state.record.take() {
            Some(record) if record.id == id => {
                if let Err(e) = self.store.delete(&record).await {
                    warn!(session_id = %id, error = %e, "Unable to delete session from store");
                }
                self.state.last_observed = Bytes::new();
                self.state.is_new = false;
            }
            retained => {
                self.state.record = retained;
                self.delete_by_identity(id).await;
            }
        }

        let key = self.config.keys.cache_key(id);
        if let Err(e) = self.cache.delete(&key).await {
            warn!(session_id = %id, key = %key, error = %e, "Unable to delete session from cache");
        }

        if self.state.session_id.as_deref() == Some(id) {
            self.state.phase = Phase::Destroyed;
        }
        debug!(session_id = %id, "Session destroyed");
    }

    async fn delete_by_identity(&self, id: &str) {
        match self.store.fetch(self.config.keys.store_key(id)).await {
            Ok(Some(record)) => {
                if let Err(e) = self.store.delete(&record).await {
                    warn!(session_id = %id, error = %e, "Unable to delete session from store");
                }
            }
            Ok(None) => trace!(session_id = %id, "No stored session to delete"),
            Err(e) => {
                warn!(session_id = %id, error = %e, "Unable to look up session for deletion");
            }
        }
    }

    /// Purge stored sessions not updated within `max_age`.
    ///
    /// Only touches the durable tier; cache entries expire through their TTL.
    /// Returns the number of purged records, `0` on failure.
    pub async fn collect_garbage(&self, max_age: Duration) -> u64 {
        let cutoff = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        match self.store.purge_stale(cutoff).await {
            Ok(purged) => {
                debug!(purged, cutoff = %cutoff, "Purged stale sessions");
                purged
            }
            Err(e) => {
                warn!(error = %e, "Unable to purge stale sessions");
                0
            }
        }
    }
}
