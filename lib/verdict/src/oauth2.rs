//! OAuth2 password-grant token lifecycle.
//!
//! The [`TokenManager`] obtains and renews access tokens for the services
//! registered with a [`PasswordGrant`]. Token requests are ordinary
//! descriptors sent through the same [`ApiClient`], without authorization and
//! with a pipeline that never retries.
//!
//! Concurrent callers for one service are collapsed: a per-service async
//! mutex serializes the flows, and whoever gets the lock second re-reads the
//! credential store before going to the network.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use crate::{
    ApiClient, BoxFuture, ContentType, Credentials, Decision, Decisions, Descriptor, Error,
    HttpClient, Parameters, Result,
};

/// Credentials of the OAuth2 password grant for one service.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordGrant {
    /// Token endpoint, used for both the password and the refresh grant.
    pub token_url: String,
    /// Resource owner user name.
    pub username: String,
    /// Resource owner password.
    pub password: String,
}

impl PasswordGrant {
    /// Create a grant.
    #[must_use]
    pub fn new(
        token_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    fn password_form(&self) -> Parameters {
        let mut form = Parameters::new();
        form.insert("grant_type".to_string(), Value::from("password"));
        form.insert("username".to_string(), Value::from(self.username.as_str()));
        form.insert("password".to_string(), Value::from(self.password.as_str()));
        form
    }
}

impl fmt::Debug for PasswordGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordGrant")
            .field("token_url", &self.token_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

fn refresh_form(refresh_token: &str) -> Parameters {
    let mut form = Parameters::new();
    form.insert("grant_type".to_string(), Value::from("refresh_token"));
    form.insert("refresh_token".to_string(), Value::from(refresh_token));
    form
}

/// Successful token endpoint response.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    /// Issued access token.
    pub access_token: String,
    /// Token type, e.g. `Bearer`.
    pub token_type: String,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<u64>,
    /// Refresh token, when issued or rotated.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    fn credentials(&self) -> Credentials {
        Credentials {
            token_type: self.token_type.clone(),
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResponse")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Error body of a token endpoint (RFC 6749 §5.2); every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OAuth2ErrorResponse {
    /// Error code, e.g. `invalid_grant`.
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable description.
    #[serde(default)]
    pub error_description: Option<String>,
    /// Page describing the error.
    #[serde(default)]
    pub error_uri: Option<String>,
}

impl fmt::Display for OAuth2ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.error.as_deref().unwrap_or("unknown_error"))?;
        if let Some(description) = &self.error_description {
            write!(f, ": {description}")?;
        }
        Ok(())
    }
}

/// Obtains and renews OAuth2 tokens, one flow at a time per service.
#[derive(Default)]
pub struct TokenManager {
    grants: HashMap<String, PasswordGrant>,
    flow_guards: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenManager")
            .field("services", &self.grants.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Create a manager for the given grants, keyed by service name.
    #[must_use]
    pub fn new(grants: HashMap<String, PasswordGrant>) -> Self {
        Self {
            grants,
            flow_guards: Mutex::default(),
        }
    }

    /// The grant registered for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingGrant`] if none is registered.
    pub fn grant(&self, service: &str) -> Result<&PasswordGrant> {
        self.grants.get(service).ok_or_else(|| Error::MissingGrant {
            service: service.to_string(),
        })
    }

    fn flow_guard(&self, service: &str) -> Arc<AsyncMutex<()>> {
        let mut guards = self
            .flow_guards
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(guards.entry(service.to_string()).or_default())
    }

    /// Run the password grant for `service` and persist the issued tokens.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingGrant`] if no grant is registered for `service`.
    /// - [`Error::TokenRequest`] if the token endpoint call fails.
    pub fn retrieve_access_token<'a, C: HttpClient>(
        &'a self,
        client: &'a ApiClient<C>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<TokenResponse>> {
        Box::pin(async move {
            let grant = self.grant(service)?;
            info!(service, "requesting access token with password grant");

            let token = request_token(client, &grant.token_url, grant.password_form())
                .await
                .map_err(|error| Error::token_request(service, error))?;

            token.credentials().persist(client.store(), service);
            debug!(service, ?token, "access token stored");
            Ok(token)
        })
    }

    /// Run the refresh grant for `service` and persist the new access token.
    ///
    /// The stored token type and refresh token are only replaced when the
    /// server returns new ones.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingGrant`] if no grant is registered for `service`.
    /// - [`Error::MissingRefreshToken`] if no refresh token is stored.
    /// - [`Error::TokenRequest`] if the token endpoint call fails.
    pub fn refresh_access_token<'a, C: HttpClient>(
        &'a self,
        client: &'a ApiClient<C>,
        service: &'a str,
    ) -> BoxFuture<'a, Result<TokenResponse>> {
        Box::pin(async move {
            let grant = self.grant(service)?;
            let refresh_token = Credentials::refresh_token(client.store(), service).ok_or_else(
                || Error::MissingRefreshToken {
                    service: service.to_string(),
                },
            )?;
            info!(service, "refreshing access token");

            let token = request_token(client, &grant.token_url, refresh_form(&refresh_token))
                .await
                .map_err(|error| Error::token_request(service, error))?;

            token.credentials().persist(client.store(), service);
            debug!(service, ?token, "refreshed access token stored");
            Ok(token)
        })
    }

    /// Make sure a token is cached for `service`, running the password grant
    /// unless a concurrent caller already did.
    pub(crate) async fn ensure_access_token<C: HttpClient>(
        &self,
        client: &ApiClient<C>,
        service: &str,
    ) -> Result<()> {
        let guard = self.flow_guard(service);
        let _singleflight = guard.lock().await;

        if Credentials::load(client.store(), service).is_some() {
            debug!(service, "access token obtained by a concurrent request");
            return Ok(());
        }

        self.retrieve_access_token(client, service).await.map(drop)
    }

    /// Replace the token `stale_token` of `service`, unless a concurrent
    /// caller already replaced it.
    pub(crate) async fn renew_access_token<C: HttpClient>(
        &self,
        client: &ApiClient<C>,
        service: &str,
        stale_token: Option<&str>,
    ) -> Result<()> {
        let guard = self.flow_guard(service);
        let _singleflight = guard.lock().await;

        let current = Credentials::access_token(client.store(), service);
        if let (Some(current), Some(stale)) = (current.as_deref(), stale_token)
            && current != stale
        {
            debug!(service, "access token already refreshed by a concurrent request");
            return Ok(());
        }

        self.refresh_access_token(client, service)
            .await
            .map(drop)
            .inspect_err(|error| warn!(service, %error, "token refresh failed"))
    }
}

async fn request_token<C: HttpClient>(
    client: &ApiClient<C>,
    token_url: &str,
    form: Parameters,
) -> Result<TokenResponse> {
    let descriptor = Descriptor::<TokenResponse, OAuth2ErrorResponse>::post(token_url)
        .parameters(form)
        .content_type(ContentType::FormUrlEncoded)
        .decisions(Decisions::new([
            Decision::BadResponseStatusCode,
            Decision::ParseResult,
        ]))
        .build();

    client.send(&descriptor).await
}
