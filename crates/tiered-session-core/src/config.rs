//! Session layer configuration.
//!
//! Built once at process startup and shared read-only by every request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{KeyScheme, keys::KEY_SEPARATOR};

/// One hour.
pub const DURATION_HOUR: Duration = Duration::from_secs(3600);

/// One day.
pub const DURATION_DAY: Duration = Duration::from_secs(86_400);

/// One week.
pub const DURATION_WEEK: Duration = Duration::from_secs(604_800);

/// Longest accepted session duration (one year).
pub const MAX_DURATION: Duration = Duration::from_secs(365 * 86_400);

/// Default session duration.
pub const DEFAULT_DURATION: Duration = DURATION_DAY;

/// Environment variable holding the session duration.
pub const ENV_DURATION: &str = "TIERED_SESSION_DURATION";

/// Environment variable holding the cache key namespace.
pub const ENV_NAMESPACE: &str = "TIERED_SESSION_NAMESPACE";

/// Environment variable holding the cache key version tag.
pub const ENV_VERSION: &str = "TIERED_SESSION_VERSION";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid session duration: {0}")]
    InvalidDuration(String),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} must not contain '{sep}'", sep = KEY_SEPARATOR)]
    Separator(&'static str),
}

/// Configuration for the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session lifetime. Used as the cache TTL and the cookie lifetime.
    #[serde(rename = "duration_secs", with = "duration_secs")]
    pub duration: Duration,

    /// Key derivation for both tiers.
    pub keys: KeyScheme,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            keys: KeyScheme::default(),
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session duration.
    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set the key scheme.
    #[must_use]
    pub fn with_keys(mut self, keys: KeyScheme) -> Self {
        self.keys = keys;
        self
    }

    /// Load overrides from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable is present but invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load overrides through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns error if a variable is present but invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(ENV_DURATION) {
            config.duration = parse_duration(&value)?;
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            config.keys.namespace = key_part(ENV_NAMESPACE, namespace)?;
        }
        if let Some(version) = lookup(ENV_VERSION) {
            config.keys.version = key_part(ENV_VERSION, version)?;
        }

        Ok(config)
    }

    /// Session duration in whole seconds.
    #[must_use]
    pub const fn duration_secs(&self) -> u64 {
        self.duration.as_secs()
    }
}

fn key_part(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty(name));
    }
    if value.contains(KEY_SEPARATOR) {
        return Err(ConfigError::Separator(name));
    }
    Ok(value)
}

/// Parse a duration preset (`hour`, `day`, `week`) or a number of seconds.
///
/// # Errors
/// Returns error for unknown presets, non-numeric values, and second counts
/// that are zero or above [`MAX_DURATION`].
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "hour" => Ok(DURATION_HOUR),
        "day" => Ok(DURATION_DAY),
        "week" => Ok(DURATION_WEEK),
        other => other
            .parse::<u64>()
            .ok()
            .and_then(bounded_duration)
            .ok_or_else(|| ConfigError::InvalidDuration(value.to_string())),
    }
}

fn bounded_duration(secs: u64) -> Option<Duration> {
    let duration = Duration::from_secs(secs);
    (secs > 0 && duration <= MAX_DURATION).then_some(duration)
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::{MAX_DURATION, bounded_duration};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(deserializer)?;
        bounded_duration(secs).ok_or_else(|| {
            D::Error::custom(format!(
                "duration_secs must be between 1 and {}, got {secs}",
                MAX_DURATION.as_secs()
            ))
        })
    }
}
