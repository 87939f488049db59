//! Session gate: the bearer credential attached to outgoing queries.
//!
//! The token is opaque. Obtaining and refreshing it is the session
//! provider's job; this module only stores it and decorates requests.
//! Anonymous queries are always valid, so an absent token simply means no
//! `Authorization` header.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::env;
use std::sync::RwLock;

/// Environment variable holding an initial session token.
pub const TOKEN_ENV: &str = "GRAPHSYNC_TOKEN";

/// Read the initial token from the environment, ignoring blanks.
pub fn token_from_env() -> Option<String> {
    env::var(TOKEN_ENV).ok().and_then(normalize_token)
}

fn normalize_token(token: String) -> Option<String> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[derive(Debug, Default)]
pub struct SessionGate {
    token: RwLock<Option<String>>,
}

impl SessionGate {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: RwLock::new(token.and_then(normalize_token)),
        }
    }

    /// Store or clear the credential. Returns whether it changed.
    ///
    /// The caller re-syncs either way; an unchanged token still repaints.
    pub fn set_token(&self, token: Option<String>) -> bool {
        let token = token.and_then(normalize_token);
        let mut guard = self
            .token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let changed = *guard != token;
        *guard = token;
        changed
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    /// Add `Authorization: Bearer <token>` when a session is active; remove
    /// any stale header otherwise.
    pub fn decorate(&self, headers: &mut HeaderMap) {
        decorate_with(headers, self.token().as_deref());
    }

    /// Fresh header map for one request.
    pub fn headers(&self) -> HeaderMap {
        bearer_headers(self.token().as_deref())
    }
}

/// Header map carrying `token`, for callers that already read the token.
pub fn bearer_headers(token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    decorate_with(&mut headers, token);
    headers
}

fn decorate_with(headers: &mut HeaderMap, token: Option<&str>) {
    match token.and_then(bearer_value) {
        Some(value) => {
            headers.insert(AUTHORIZATION, value);
        }
        None => {
            headers.remove(AUTHORIZATION);
        }
    }
}

/// Tokens with characters not allowed in a header are dropped rather than
/// sent malformed.
fn bearer_value(token: &str) -> Option<HeaderValue> {
    match HeaderValue::from_str(&format!("Bearer {}", token)) {
        Ok(mut value) => {
            value.set_sensitive(true);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("session token contains invalid header characters; sending anonymously");
            None
        }
    }
}

/// Extract the bearer token from request headers.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
