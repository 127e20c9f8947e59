//! Session middleware for axum routers.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, header::SET_COOKIE},
    middleware::{Next, from_fn_with_state},
    response::Response,
};
use tiered_session::SessionEngine;
use tiered_session_core::{SessionCache, SessionStore};
use tracing::{debug, warn};

use crate::{Session, cookie::CookieSettings, generate_session_id};

/// Engine plus cookie settings, shared by every request.
pub struct SessionLayer<C: ?Sized, S: ?Sized> {
    engine: SessionEngine<C, S>,
    cookie: Arc<CookieSettings>,
}

impl<C: ?Sized, S: ?Sized> SessionLayer<C, S> {
    /// Create a layer with the default cookie settings.
    #[must_use]
    pub fn new(engine: SessionEngine<C, S>) -> Self {
        Self {
            engine,
            cookie: Arc::new(CookieSettings::default()),
        }
    }

    /// Replace the cookie settings.
    #[must_use]
    pub fn with_cookie(mut self, cookie: CookieSettings) -> Self {
        self.cookie = Arc::new(cookie);
        self
    }

    /// Session engine.
    #[must_use]
    pub const fn engine(&self) -> &SessionEngine<C, S> {
        &self.engine
    }

    /// Cookie settings.
    #[must_use]
    pub fn cookie(&self) -> &CookieSettings {
        &self.cookie
    }
}

impl<C: ?Sized, S: ?Sized> Clone for SessionLayer<C, S> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            cookie: Arc::clone(&self.cookie),
        }
    }
}

/// Run one request inside a session.
///
/// Reads the session before the handler runs, then writes it back (or
/// destroys it) and re-issues the cookie so its lifetime starts over.
pub async fn session_middleware<C, S>(
    State(layer): State<SessionLayer<C, S>>,
    mut request: Request,
    next: Next,
) -> Response
where
    C: SessionCache + ?Sized + 'static,
    S: SessionStore + ?Sized + 'static,
{
    let id = layer
        .cookie
        .session_id(request.headers())
        .unwrap_or_else(generate_session_id);

    let mut coordinator = layer.engine.coordinator();
    let payload = coordinator.read(&id).await;
    let session = Session::from_payload(&id, &payload);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    let cookie = if session.is_destroyed() {
        coordinator.destroy(&id).await;
        layer.cookie.expire()
    } else {
        match session.to_payload() {
            Ok(payload) => {
                let outcome = coordinator.write(&id, payload).await;
                debug!(session_id = %id, ?outcome, "Session written");
            }
            Err(e) => warn!(session_id = %id, error = %e, "Unable to encode session"),
        }
        layer.cookie.issue(&id, layer.engine.config().duration)
    };

    match HeaderValue::from_str(&cookie) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => warn!(session_id = %id, error = %e, "Unable to set session cookie"),
    }

    response
}

/// Install the session middleware on a router.
///
/// # Example
/// ```ignore
/// let app = with_sessions(
///     Router::new().route("/", get(handler)),
///     SessionLayer::new(engine),
/// );
/// ```
pub fn with_sessions<C, S, St>(router: Router<St>, layer: SessionLayer<C, S>) -> Router<St>
where
    C: SessionCache + ?Sized + 'static,
    S: SessionStore + ?Sized + 'static,
    St: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(layer, session_middleware::<C, S>))
}
