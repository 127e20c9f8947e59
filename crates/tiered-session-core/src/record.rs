//! Durable session record.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted session state.
///
/// Identity is the session identifier. The payload is opaque to this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier (durable identity key).
    pub id: String,
    /// Serialized session state.
    pub payload: Bytes,
    /// When the record was first written.
    pub created_at: DateTime<Utc>,
    /// When the record was last written.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record stamped with the current time.
    #[must_use]
    pub fn new(id: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            payload: payload.into(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the record was last written before `cutoff`.
    #[must_use]
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.updated_at < cutoff
    }
}
