//! Two-tier session persistence.
//!
//! Provides:
//! - `SessionEngine` - Shared backends and configuration
//! - `SessionCoordinator` - Per-request read/write/destroy protocol
//! - Cache implementations (null, memory, Redis)
//! - Store implementations (memory, SQLite)

pub mod cache;
pub mod coordinator;
pub mod engine;
pub mod storage;

#[cfg(test)]
mod testing;

pub use cache::NullCache;
pub use coordinator::{Phase, SessionCoordinator, WriteOutcome};
pub use engine::{DynSessionEngine, SessionEngine};
pub use tiered_session_core::{
    CacheError, KeyScheme, SessionCache, SessionConfig, SessionRecord, SessionStore, StorageError,
};

#[cfg(feature = "memory")]
pub use cache::MemoryCache;
#[cfg(feature = "memory")]
pub use storage::MemoryStore;

#[cfg(feature = "redis")]
pub use cache::RedisCache;
#[cfg(feature = "sqlite")]
pub use storage::SqliteStore;
