//! Credential store binding.
//!
//! Tokens are kept under per-service keys:
//!
//! | Key | Value |
//! |-----|-------|
//! | `{service}_token_type` | e.g. `Bearer` |
//! | `{service}_access_token` | current access token |
//! | `{service}_refresh_token` | refresh token, when the server issued one |
//!
//! Writes of the three keys are not atomic.

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Key-value store for token fields (keychain, secret service, memory...).
pub trait CredentialStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one.
    fn set(&self, key: &str, value: &str);
}

/// In-memory [`CredentialStore`], the default for clients.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCredentialStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }
}

fn token_type_key(service: &str) -> String {
    format!("{service}_token_type")
}

fn access_token_key(service: &str) -> String {
    format!("{service}_access_token")
}

fn refresh_token_key(service: &str) -> String {
    format!("{service}_refresh_token")
}

/// Token fields stored for one service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Token type, used as the `Authorization` scheme.
    pub token_type: String,
    /// Access token.
    pub access_token: String,
    /// Refresh token, if any.
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Load the credentials of `service`; `None` unless both token type and
    /// access token are stored.
    pub fn load(store: &dyn CredentialStore, service: &str) -> Option<Self> {
        let token_type = store.get(&token_type_key(service))?;
        let access_token = store.get(&access_token_key(service))?;
        Some(Self {
            token_type,
            access_token,
            refresh_token: store.get(&refresh_token_key(service)),
        })
    }

    /// Current access token of `service`.
    pub fn access_token(store: &dyn CredentialStore, service: &str) -> Option<String> {
        store.get(&access_token_key(service))
    }

    /// Current refresh token of `service`.
    pub fn refresh_token(store: &dyn CredentialStore, service: &str) -> Option<String> {
        store.get(&refresh_token_key(service))
    }

    /// Write every field; a `None` refresh token leaves the stored one in place.
    pub fn persist(&self, store: &dyn CredentialStore, service: &str) {
        store.set(&token_type_key(service), &self.token_type);
        store.set(&access_token_key(service), &self.access_token);
        if let Some(refresh_token) = &self.refresh_token {
            store.set(&refresh_token_key(service), refresh_token);
        }
    }

    /// `Authorization` header value: `{token_type} {access_token}`.
    #[must_use]
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token_type", &self.token_type)
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(refresh: Option<&str>) -> Credentials {
        Credentials {
            token_type: "Bearer".to_string(),
            access_token: "abc".to_string(),
            refresh_token: refresh.map(str::to_string),
        }
    }

    #[test]
    fn persist_uses_service_scoped_keys() {
        let store = MemoryCredentialStore::new();
        credentials(Some("r1")).persist(&store, "flickr");

        assert_eq!(store.get("flickr_token_type").as_deref(), Some("Bearer"));
        assert_eq!(store.get("flickr_access_token").as_deref(), Some("abc"));
        assert_eq!(store.get("flickr_refresh_token").as_deref(), Some("r1"));
        assert_eq!(store.get("github_access_token"), None);
    }

    #[test]
    fn load_requires_type_and_access_token() {
        let store = MemoryCredentialStore::new();
        assert!(Credentials::load(&store, "svc").is_none());

        store.set("svc_access_token", "abc");
        assert!(Credentials::load(&store, "svc").is_none());

        store.set("svc_token_type", "Bearer");
        let loaded = Credentials::load(&store, "svc").expect("credentials");
        assert_eq!(loaded, credentials(None));
    }

    #[test]
    fn persist_without_refresh_token_keeps_previous_one() {
        let store = MemoryCredentialStore::new();
        credentials(Some("r1")).persist(&store, "svc");
        credentials(None).persist(&store, "svc");

        assert_eq!(Credentials::refresh_token(&store, "svc").as_deref(), Some("r1"));
    }

    #[test]
    fn authorization_value() {
        assert_eq!(credentials(None).authorization(), "Bearer abc");
    }

    #[test]
    fn debug_redacts_tokens() {
        let debug = format!("{:?}", credentials(Some("r1")));
        assert!(!debug.contains("abc"));
        assert!(!debug.contains("r1"));
    }
}
