//! The client façade.
//!
//! [`ApiClient`] turns a [`Descriptor`] into exactly one terminal result:
//!
//! 1. Build the request with the adapter chain. A missing OAuth2 token runs
//!    the password grant, then the build is tried again.
//! 2. Execute it with the transport and reject bodiless or non-HTTP
//!    responses.
//! 3. Evaluate the decisions. `Done` and `Errored` end the call, a restart
//!    resends the request with the list the decisions returned.
//!
//! Password grants and restarts are bounded by the [`SendPolicy`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{
    BoxFuture, BuiltRequest, CredentialStore, DecisionContext, Decisions, Descriptor, Error,
    HttpClient, HyperClient, MemoryCredentialStore, Result, SendPolicy, TokenRefresher, Verdict,
    build_request, evaluate,
    oauth2::{PasswordGrant, TokenManager},
};

struct Inner<C> {
    transport: C,
    store: Arc<dyn CredentialStore>,
    policy: SendPolicy,
    tokens: TokenManager,
}

/// Sends descriptors and interprets their responses.
///
/// Cloning is cheap and clones share the transport, the credential store and
/// the token flows.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use verdict::{ApiClient, AuthScheme, Descriptor};
///
/// #[derive(Debug, Deserialize)]
/// struct Photos {
///     total: u32,
/// }
///
/// # async fn run() -> verdict::Result<()> {
/// let client = ApiClient::new();
/// let search = Descriptor::<Photos>::get("https://api.example.com/search")
///     .param("text", "cats")
///     .authorization(AuthScheme::api_key_query("api_key", "secret"))
///     .build();
///
/// let photos = client.send(&search).await?;
/// println!("{} photos", photos.total);
/// # Ok(())
/// # }
/// ```
pub struct ApiClient<C = HyperClient> {
    inner: Arc<Inner<C>>,
}

impl<C> Clone for ApiClient<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C> fmt::Debug for ApiClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("policy", &self.inner.policy)
            .field("tokens", &self.inner.tokens)
            .finish_non_exhaustive()
    }
}

impl ApiClient<HyperClient> {
    /// Client with the default hyper transport, an in-memory credential
    /// store and the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    #[must_use]
    pub fn builder() -> ApiClientBuilder<HyperClient> {
        ApiClientBuilder::new(HyperClient::new())
    }
}

impl Default for ApiClient<HyperClient> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ApiClient<C> {
    /// The transport.
    #[must_use]
    pub fn transport(&self) -> &C {
        &self.inner.transport
    }

    /// The credential store.
    #[must_use]
    pub fn store(&self) -> &dyn CredentialStore {
        self.inner.store.as_ref()
    }

    /// The send policy.
    #[must_use]
    pub fn policy(&self) -> &SendPolicy {
        &self.inner.policy
    }

    /// The token manager.
    #[must_use]
    pub fn tokens(&self) -> &TokenManager {
        &self.inner.tokens
    }
}

impl<C: HttpClient> ApiClient<C> {
    /// Send with the descriptor's decisions.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the call; see [`Error`] for the families.
    pub async fn send<S, F>(&self, descriptor: &Descriptor<S, F>) -> Result<S>
    where
        S: DeserializeOwned,
        F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        self.send_with(descriptor, None).await
    }

    /// Send with `decisions`, or the descriptor's own when `None`.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the call.
    pub async fn send_with<S, F>(
        &self,
        descriptor: &Descriptor<S, F>,
        decisions: Option<Decisions>,
    ) -> Result<S>
    where
        S: DeserializeOwned,
        F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let span = info_span!("send", method = %descriptor.method(), url = descriptor.url());
        self.run(descriptor, decisions).instrument(span).await
    }

    /// Send, giving up with [`Error::Cancelled`] once `cancellation` fires.
    ///
    /// An in-flight transport call is dropped, and so is any token request
    /// this call is waiting on.
    ///
    /// # Errors
    ///
    /// Returns the terminal error of the call, or [`Error::Cancelled`].
    pub async fn send_with_cancellation<S, F>(
        &self,
        descriptor: &Descriptor<S, F>,
        decisions: Option<Decisions>,
        cancellation: CancellationToken,
    ) -> Result<S>
    where
        S: DeserializeOwned,
        F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        tokio::select! {
            biased;
            () = cancellation.cancelled() => {
                warn!(method = %descriptor.method(), url = descriptor.url(), "send cancelled");
                Err(Error::Cancelled)
            }
            result = self.send_with(descriptor, decisions) => result,
        }
    }

    async fn run<S, F>(
        &self,
        descriptor: &Descriptor<S, F>,
        decisions: Option<Decisions>,
    ) -> Result<S>
    where
        S: DeserializeOwned,
        F: DeserializeOwned + fmt::Debug + Send + Sync + 'static,
    {
        let policy = self.inner.policy;
        let mut decisions =
            decisions.unwrap_or_else(|| descriptor.decisions(policy.retry_budget));
        let mut restarts = 0;
        let mut recoveries = 0;

        loop {
            let BuiltRequest {
                request,
                access_token,
            } = match build_request(descriptor, self.store()) {
                Ok(built) => built,
                Err(Error::Unauthorized { service })
                    if recoveries < policy.max_unauthorized_recoveries =>
                {
                    recoveries += 1;
                    info!(service, "no cached access token");
                    self.inner.tokens.ensure_access_token(self, &service).await?;
                    continue;
                }
                Err(error) => return Err(error),
            };

            let response = self
                .inner
                .transport
                .execute(request.clone())
                .await?
                .into_complete()?;

            let context = DecisionContext {
                request: &request,
                authorization: descriptor.authorization(),
                access_token: access_token.as_deref(),
                refresher: self,
            };
            match evaluate::<S, F>(&context, response, decisions).await {
                Verdict::Done(value) => return Ok(value),
                Verdict::Errored(error) => return Err(error),
                Verdict::Restart(next) => {
                    restarts += 1;
                    if restarts > policy.max_restarts {
                        warn!(restarts, "giving up after too many restarts");
                        return Err(Error::TooManyRestarts {
                            count: restarts,
                            max: policy.max_restarts,
                        });
                    }
                    debug!(restarts, decisions = %next, "resending request");
                    decisions = next;
                }
            }
        }
    }
}

impl<C: HttpClient> TokenRefresher for ApiClient<C> {
    fn refresh<'a>(
        &'a self,
        service: &'a str,
        stale_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(
            self.inner
                .tokens
                .renew_access_token(self, service, stale_token),
        )
    }
}

/// Builder for [`ApiClient`].
pub struct ApiClientBuilder<C> {
    transport: C,
    store: Option<Arc<dyn CredentialStore>>,
    policy: SendPolicy,
    grants: HashMap<String, PasswordGrant>,
}

impl<C> fmt::Debug for ApiClientBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("policy", &self.policy)
            .field("custom_store", &self.store.is_some())
            .field("grants", &self.grants.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl<C> ApiClientBuilder<C> {
    /// Start a builder around `transport`.
    #[must_use]
    pub fn new(transport: C) -> Self {
        Self {
            transport,
            store: None,
            policy: SendPolicy::default(),
            grants: HashMap::new(),
        }
    }

    /// Replace the transport.
    #[must_use]
    pub fn transport<T>(self, transport: T) -> ApiClientBuilder<T> {
        ApiClientBuilder {
            transport,
            store: self.store,
            policy: self.policy,
            grants: self.grants,
        }
    }

    /// Use `store` for tokens instead of a fresh in-memory store.
    #[must_use]
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the send policy.
    #[must_use]
    pub const fn policy(mut self, policy: SendPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Register the password grant of `service`.
    #[must_use]
    pub fn password_grant(mut self, service: impl Into<String>, grant: PasswordGrant) -> Self {
        self.grants.insert(service.into(), grant);
        self
    }

    /// Build the client.
    #[must_use]
    pub fn build(self) -> ApiClient<C> {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryCredentialStore::new()));
        ApiClient {
            inner: Arc::new(Inner {
                transport: self.transport,
                store,
                policy: self.policy,
                tokens: TokenManager::new(self.grants),
            }),
        }
    }
}
