//! Core abstractions for two-tier session persistence.
//!
//! This crate provides the fundamental building blocks:
//! - `SessionCache` / `SessionStore` - Capability traits for the two tiers
//! - `SessionRecord` - Durable session entity
//! - `KeyScheme` - Cache and store key derivation
//! - `SessionConfig` - Session duration and key configuration

pub mod config;
pub mod keys;
pub mod record;
pub mod traits;

pub use config::{ConfigError, SessionConfig};
pub use keys::KeyScheme;
pub use record::SessionRecord;
pub use traits::{CacheError, SessionCache, SessionStore, StorageError};
