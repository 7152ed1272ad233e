//! Streamer Authentication
//!
//! The streamer authenticates by API key passed as a query parameter on the
//! WebSocket URL. There is no auth message: the server answers the upgrade
//! with a welcome frame (`TYPE` 20) or an unauthorized frame (`TYPE` 401).
//!
//! Because the key is part of the URL, rotating it only affects the next
//! connection. The live socket keeps the key it was opened with.
//!
//! # References
//!
//! - [Streamer docs](https://min-api.cryptocompare.com/documentation/websockets)

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::Url;

/// Errors building the authenticated endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The configured base URL is not a valid URL.
    #[error("invalid streamer URL {url}: {reason}")]
    InvalidEndpoint {
        /// Offending URL.
        url: String,
        /// Parser message.
        reason: String,
    },
}

// =============================================================================
// API Key
// =============================================================================

/// Opaque API key. `Debug` output is redacted.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether no key has been configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("ApiKey(<empty>)")
        } else {
            f.write_str("ApiKey([REDACTED])")
        }
    }
}

// =============================================================================
// Credential Store
// =============================================================================

/// Shared holder for the current API key.
///
/// Cloning yields another handle to the same value. Only read when a
/// connection builds its endpoint.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<ApiKey>>,
}

impl CredentialStore {
    /// Create a store holding `key`.
    #[must_use]
    pub fn new(key: ApiKey) -> Self {
        Self {
            inner: Arc::new(RwLock::new(key)),
        }
    }

    /// Current key.
    #[must_use]
    pub fn get(&self) -> ApiKey {
        self.inner.read().clone()
    }

    /// Replace the key. Takes effect on the next `connect()`.
    pub fn set(&self, key: ApiKey) {
        *self.inner.write() = key;
        tracing::debug!("API key updated; applies to the next connection");
    }
}

/// Build the authenticated streamer URL: `<base>?api_key=<key>`.
///
/// The key is percent-encoded. An empty key is still appended so the
/// server, not the client, decides whether it is acceptable.
///
/// # Errors
///
/// Returns an error if `base_url` does not parse.
pub fn authenticated_url(base_url: &str, key: &ApiKey) -> Result<Url, AuthError> {
    let mut url = Url::parse(base_url).map_err(|e| AuthError::InvalidEndpoint {
        url: base_url.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut().append_pair("api_key", key.expose());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_redacts() {
        let key = ApiKey::new("super_secret");
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("super_secret"));
    }

    #[test]
    fn empty_api_key_debug() {
        assert_eq!(format!("{:?}", ApiKey::default()), "ApiKey(<empty>)");
        assert!(ApiKey::default().is_empty());
    }

    #[test]
    fn store_clones_share_value() {
        let store = CredentialStore::new(ApiKey::new("one"));
        let handle = store.clone();
        handle.set(ApiKey::new("two"));
        assert_eq!(store.get().expose(), "two");
    }

    #[test]
    fn authenticated_url_appends_key() {
        let url =
            authenticated_url("wss://streamer.cryptocompare.com/v2", &ApiKey::new("abc123"))
                .unwrap();
        assert_eq!(
            url.as_str(),
            "wss://streamer.cryptocompare.com/v2?api_key=abc123"
        );
    }

    #[test]
    fn authenticated_url_encodes_key() {
        let url = authenticated_url("wss://example.test/v2", &ApiKey::new("a b&c")).unwrap();
        assert_eq!(url.as_str(), "wss://example.test/v2?api_key=a+b%26c");
    }

    #[test]
    fn authenticated_url_rejects_garbage() {
        let result = authenticated_url("not a url", &ApiKey::new("k"));
        assert!(matches!(result, Err(AuthError::InvalidEndpoint { .. })));
    }
}
