//! Session cookie handling.

use std::time::Duration;

use axum::http::{HeaderMap, header::COOKIE};
use chrono::{DateTime, Utc};
use tiered_session_core::keys::DEFAULT_VERSION;
use uuid::Uuid;

/// Longest session id accepted from a client.
pub const MAX_SESSION_ID_LEN: usize = 128;

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Whether a client-supplied id is safe to use as a session id.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Generate a fresh session id.
#[must_use]
pub fn generate_session_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Cookie attributes for the session id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieSettings {
    /// Cookie name.
    pub name: String,
    /// Path the cookie applies to.
    pub path: String,
    /// Send only over HTTPS.
    pub secure: bool,
    /// Hide the cookie from scripts.
    pub http_only: bool,
}

impl Default for CookieSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_VERSION.to_string(),
            path: "/".to_string(),
            secure: false,
            http_only: true,
        }
    }
}

impl CookieSettings {
    /// Create settings with the defaults (`TSIDv3`, path `/`, HttpOnly).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cookie name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the cookie path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the `Secure` flag.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Find the first valid session id among the request's cookies.
    ///
    /// Malformed ids are ignored so the caller starts a fresh session.
    #[must_use]
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| name.trim() == self.name)
            .map(|(_, value)| value.trim().trim_matches('"'))
            .find(|value| is_valid_session_id(value))
            .map(ToString::to_string)
    }

    /// `Set-Cookie` value carrying `id` for another `max_age`.
    #[must_use]
    pub fn issue(&self, id: &str, max_age: Duration) -> String {
        let expires = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_add_signed(age))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.render(id, max_age.as_secs(), expires)
    }

    /// `Set-Cookie` value telling the client to drop the session cookie.
    #[must_use]
    pub fn expire(&self) -> String {
        self.render("", 0, DateTime::<Utc>::default())
    }

    fn render(&self, value: &str, max_age: u64, expires: DateTime<Utc>) -> String {
        let mut cookie = format!(
            "{}={value}; Path={}; Max-Age={max_age}; Expires={}",
            self.name,
            self.path,
            expires.format(HTTP_DATE),
        );
        if self.http_only {
            cookie.push_str("; HttpOnly");
        }
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie.push_str("; SameSite=Lax");
        cookie
    }
}
