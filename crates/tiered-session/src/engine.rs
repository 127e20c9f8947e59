//! Process-wide session engine.

use std::sync::Arc;

use tiered_session_core::{SessionCache, SessionConfig, SessionStore};

use crate::{SessionCoordinator, cache::NullCache};

/// Engine over trait-object backends, for backends chosen at runtime.
pub type DynSessionEngine = SessionEngine<dyn SessionCache, dyn SessionStore>;

/// Shared backends and configuration, built once at startup.
///
/// Cloning is cheap. Each request gets its own [`SessionCoordinator`] from
/// [`SessionEngine::coordinator`].
pub struct SessionEngine<C: ?Sized, S: ?Sized> {
    cache: Arc<C>,
    store: Arc<S>,
    config: Arc<SessionConfig>,
}

impl<S: SessionStore> SessionEngine<NullCache, S> {
    /// Create an engine without a cache tier.
    #[must_use]
    pub fn new(store: S, config: SessionConfig) -> Self {
        Self::with_cache(NullCache, store, config)
    }
}

impl<C: SessionCache, S: SessionStore> SessionEngine<C, S> {
    /// Create an engine with both tiers.
    #[must_use]
    pub fn with_cache(cache: C, store: S, config: SessionConfig) -> Self {
        Self::from_shared(Arc::new(cache), Arc::new(store), config)
    }
}

impl<C, S> SessionEngine<C, S>
where
    C: SessionCache + ?Sized,
    S: SessionStore + ?Sized,
{
    /// Create an engine from already shared backends.
    #[must_use]
    pub fn from_shared(cache: Arc<C>, store: Arc<S>, config: SessionConfig) -> Self {
        Self {
            cache,
            store,
            config: Arc::new(config),
        }
    }

    /// Start the session protocol for one request.
    #[must_use]
    pub fn coordinator(&self) -> SessionCoordinator<C, S> {
        SessionCoordinator::new(
            Arc::clone(&self.cache),
            Arc::clone(&self.store),
            Arc::clone(&self.config),
        )
    }

    /// Session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Cache backend.
    #[must_use]
    pub fn cache(&self) -> &Arc<C> {
        &self.cache
    }

    /// Durable store backend.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

impl<C: ?Sized, S: ?Sized> Clone for SessionEngine<C, S> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}
