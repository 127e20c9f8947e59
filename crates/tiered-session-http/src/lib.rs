//! HTTP lifecycle glue for tiered sessions.
//!
//! Provides:
//! - Session cookie parsing and issuing
//! - `Session` handle exposed to axum handlers
//! - Middleware running read / write / destroy around each request

pub mod cookie;
pub mod middleware;
pub mod session;

pub use cookie::{CookieSettings, generate_session_id, is_valid_session_id};
pub use middleware::{SessionLayer, session_middleware, with_sessions};
pub use session::Session;
