//! Key derivation for both tiers.

use serde::{Deserialize, Serialize};

/// Default cache key namespace.
pub const DEFAULT_NAMESPACE: &str = "tiered_session";

/// Default protocol/version tag.
///
/// Bump this when the payload format changes: entries written under the old
/// tag stop matching and age out of the cache on their own.
pub const DEFAULT_VERSION: &str = "TSIDv3";

/// Separator between the parts of a cache key.
pub const KEY_SEPARATOR: char = ':';

/// Maps session identifiers to cache keys and durable identity keys.
///
/// `namespace` and `version` must not contain [`KEY_SEPARATOR`]: the id is
/// the free-form last part, so a separator in an earlier part makes
/// `ns:v1` + `a:b` and `ns:v1:a` + `b` derive the same key.
/// [`crate::SessionConfig::from_lookup`] enforces this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyScheme {
    /// Fixed prefix shared by every cache key.
    pub namespace: String,
    /// Protocol/version tag.
    pub version: String,
}

impl Default for KeyScheme {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl KeyScheme {
    /// Create a key scheme.
    #[must_use]
    pub fn new(namespace: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: version.into(),
        }
    }

    /// Cache key for a session identifier.
    #[must_use]
    pub fn cache_key(&self, id: &str) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{id}",
            self.namespace, self.version
        )
    }

    /// Durable identity key for a session identifier (the identifier itself).
    #[must_use]
    pub fn store_key<'a>(&self, id: &'a str) -> &'a str {
        id
    }
}
