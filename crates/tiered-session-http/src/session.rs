//! Per-request session handle.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    data: Map<String, Value>,
    destroyed: bool,
}

/// Working copy of one session's data, shared between the middleware and
/// the handler.
///
/// Data is a JSON object with ordered keys, so identical contents always
/// encode to identical bytes.
#[derive(Debug, Clone)]
pub struct Session {
    id: Arc<str>,
    inner: Arc<Mutex<Inner>>,
}

impl Session {
    /// Decode a stored payload. An empty payload is an empty session.
    #[must_use]
    pub fn from_payload(id: &str, payload: &[u8]) -> Self {
        let data = if payload.is_empty() {
            Map::new()
        } else {
            serde_json::from_slice(payload).unwrap_or_else(|e| {
                warn!(session_id = %id, error = %e, "Discarding undecodable session payload");
                Map::new()
            })
        };

        Self {
            id: Arc::from(id),
            inner: Arc::new(Mutex::new(Inner {
                data,
                destroyed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get a value, `None` when missing or of a different shape.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.lock().data.get(key).cloned()?;
        serde_json::from_value(value).ok()
    }

    /// Store a value under `key`.
    ///
    /// # Errors
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn insert<T: Serialize>(
        &self,
        key: impl Into<String>,
        value: T,
    ) -> Result<(), serde_json::Error> {
        let value = serde_json::to_value(value)?;
        self.lock().data.insert(key.into(), value);
        Ok(())
    }

    /// Remove a value, returning it if present.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().data.remove(key)
    }

    /// Remove every value.
    pub fn clear(&self) {
        self.lock().data.clear();
    }

    /// Number of stored values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().data.len()
    }

    /// Whether no values are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().data.is_empty()
    }

    /// Mark the session for destruction once the handler returns.
    pub fn destroy(&self) {
        let mut inner = self.lock();
        inner.data.clear();
        inner.destroyed = true;
    }

    /// Whether [`Session::destroy`] was called.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lock().destroyed
    }

    /// Encode the working copy. An empty session encodes to an empty payload.
    ///
    /// # Errors
    /// Returns an error if the data cannot be serialized.
    pub fn to_payload(&self) -> Result<Bytes, serde_json::Error> {
        let inner = self.lock();
        if inner.data.is_empty() {
            return Ok(Bytes::new());
        }
        serde_json::to_vec(&inner.data).map(Bytes::from)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or((
            StatusCode::INTERNAL_SERVER_ERROR,
            "Session middleware is not installed",
        ))
    }
}
