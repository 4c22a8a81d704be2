//! HTTP client layer driven by descriptors and decisions.
//!
//! A [`Descriptor`] says what to call. The [`ApiClient`] builds the request
//! through the adapter chain, sends it over an [`HttpClient`] transport, and
//! runs the response through a list of [`Decision`]s until one of them
//! produces the typed value or an [`Error`].
//!
//! The default decisions are, in order:
//!
//! | Decision | Applies when | Effect |
//! |---|---|---|
//! | refresh token | `401` | OAuth2: refresh the token and resend; otherwise fail with [`Error::Api`] |
//! | retry(n) | non-2xx and `n > 0` | resend with retry(n - 1) |
//! | bad response status code | non-2xx | decode the failure payload into [`Error::Api`] |
//! | data mapping | empty body | replace the body with `{}` |
//! | parse result | always | decode the success payload |
//!
//! # Example
//!
//! ```no_run
//! use serde::Deserialize;
//! use verdict::{ApiClient, AuthScheme, Descriptor, PasswordGrant};
//!
//! #[derive(Debug, Deserialize)]
//! struct Profile {
//!     login: String,
//! }
//!
//! #[derive(Debug, Deserialize)]
//! struct ApiFailure {
//!     message: String,
//! }
//!
//! # async fn run() -> verdict::Result<()> {
//! let client = ApiClient::builder()
//!     .password_grant(
//!         "example",
//!         PasswordGrant::new("https://auth.example.com/token", "alice", "secret"),
//!     )
//!     .build();
//!
//! let me = Descriptor::<Profile, ApiFailure>::get("https://api.example.com/me")
//!     .authorization(AuthScheme::oauth2("example"))
//!     .build();
//!
//! match client.send(&me).await {
//!     Ok(profile) => println!("hello {}", profile.login),
//!     Err(error) => match error.api_payload::<ApiFailure>() {
//!         Some(failure) => println!("API error: {}", failure.message),
//!         None => println!("error: {error}"),
//!     },
//! }
//! # Ok(())
//! # }
//! ```

mod api_client;
mod client;
mod config;
mod connector;
pub mod middleware;
mod oauth2;
pub mod prelude;

pub use api_client::{ApiClient, ApiClientBuilder};
pub use client::{BoxedService, HyperClient, HyperClientBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder, SendPolicy, SendPolicyBuilder};
pub use oauth2::{OAuth2ErrorResponse, PasswordGrant, TokenManager, TokenResponse};

// Re-export tower for middleware composition
pub use tower;
pub use tokio_util::sync::CancellationToken;

// Re-export core types
pub use verdict_core::{
    Adapter, ApiKeyPlace, ApiPayload, AuthScheme, BoxFuture, BuiltRequest, ContentType,
    CredentialStore, Credentials, DataMapping, Decision, DecisionAction, DecisionContext,
    Decisions, Descriptor, DescriptorBuilder, Error, HttpClient, MemoryCredentialStore, Method,
    Parameters, RawResponse, Request, RequestBuilder, Response, Result, TokenRefresher, Verdict,
    build_request, evaluate, from_json, to_form, to_json,
};

// Re-export http types for status codes and headers
pub use verdict_core::{StatusCode, header};
