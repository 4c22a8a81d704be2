//! Error types for verdict.
//!
//! One flat [`Error`] covers every way a send can end badly. The variants fall
//! into families that callers usually branch on:
//!
//! | Family | Variants | Retried? |
//! |--------|----------|----------|
//! | build | `InvalidUrl`, `Unauthorized`, `MissingGrant`, `*Serialization`, `InvalidRequest` | no (`Unauthorized` is recovered once by the client) |
//! | transport | `Connection`, `Tls`, `Timeout` | no |
//! | protocol | `NilBody`, `NonHttpResponse` | no |
//! | decode | `JsonDeserialization` | no |
//! | api | `Api` | after refresh/retry decisions declined |
//! | token | `TokenRequest`, `MissingRefreshToken` | no |
//! | control | `DecisionsExhausted`, `TooManyRestarts`, `Cancelled` | no |

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use derive_more::{Display, Error, From};

// ============================================================================
// Typed API payload
// ============================================================================

trait Payload: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
}

impl<T> Payload for T
where
    T: Any + fmt::Debug + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The server-reported failure, decoded into the descriptor's failure type.
///
/// The concrete type is erased so [`Error`] stays a single non-generic enum;
/// use [`ApiPayload::downcast_ref`] (or [`Error::api_payload`]) to get it back.
#[derive(Clone)]
pub struct ApiPayload(Arc<dyn Payload>);

impl ApiPayload {
    /// Wrap a decoded failure payload.
    #[must_use]
    pub fn new<F>(payload: F) -> Self
    where
        F: fmt::Debug + Send + Sync + 'static,
    {
        Self(Arc::new(payload))
    }

    /// Borrow the payload as `F`, if that is its type.
    #[must_use]
    pub fn downcast_ref<F: 'static>(&self) -> Option<&F> {
        (*self.0).as_any().downcast_ref::<F>()
    }
}

impl fmt::Debug for ApiPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

// ============================================================================
// Error Type
// ============================================================================

/// Main error type for verdict operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// The descriptor URL could not be parsed.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// No cached OAuth2 token for the service.
    ///
    /// Raised by the authorization adapter; the client intercepts it and runs
    /// the password grant before surfacing it.
    #[display("unauthorized: no access token cached for service '{service}'")]
    #[from(skip)]
    Unauthorized {
        /// Service name used as the credential-store key prefix.
        #[error(not(source))]
        service: String,
    },

    /// No password grant is registered for the service.
    #[display("no password grant registered for service '{service}'")]
    #[from(skip)]
    MissingGrant {
        /// Service name.
        #[error(not(source))]
        service: String,
    },

    /// Invalid request configuration.
    #[display("invalid request: {_0}")]
    #[from(skip)]
    InvalidRequest(#[error(not(source))] String),

    /// JSON serialization error.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// Form URL-encoded serialization error.
    #[display("form serialization error: {_0}")]
    #[from]
    FormSerialization(serde_html_form::ser::Error),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// The transport completed without a body.
    #[display("response has no body")]
    #[from(skip)]
    NilBody,

    /// The transport completed with something that is not an HTTP response.
    #[display("non-HTTP response (status {status})")]
    #[from(skip)]
    NonHttpResponse {
        /// The status code reported by the transport.
        status: u16,
    },

    /// JSON deserialization error with path context.
    #[display("JSON deserialization error at '{path}': {message}")]
    #[from(skip)]
    JsonDeserialization {
        /// JSON path to the error (e.g., "user.address.city").
        path: String,
        /// Error message.
        message: String,
    },

    /// Server-reported failure decoded into the descriptor's failure type.
    #[display("API error {status}")]
    #[from(skip)]
    Api {
        /// HTTP status code.
        status: u16,
        /// Decoded failure payload.
        #[error(not(source))]
        payload: ApiPayload,
    },

    /// A token request (password or refresh grant) failed.
    #[display("token request for service '{service}' failed: {source}")]
    #[from(skip)]
    TokenRequest {
        /// Service name.
        service: String,
        /// Underlying failure.
        source: Box<Error>,
    },

    /// A refresh was required but no refresh token is stored.
    #[display("no refresh token stored for service '{service}'")]
    #[from(skip)]
    MissingRefreshToken {
        /// Service name.
        #[error(not(source))]
        service: String,
    },

    /// The decision list ran out without a terminal action.
    #[display("decision list exhausted without a terminal action")]
    #[from(skip)]
    DecisionsExhausted,

    /// Too many restarts for a single send.
    #[display("too many restarts ({count} exceeded max of {max})")]
    #[from(skip)]
    TooManyRestarts {
        /// Number of restarts performed.
        count: u32,
        /// Maximum allowed restarts.
        max: u32,
    },

    /// The send was cancelled by its cancellation token.
    #[display("request cancelled")]
    #[from(skip)]
    Cancelled,
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create an invalid request error.
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an unauthorized (missing token) error.
    #[must_use]
    pub fn unauthorized(service: impl Into<String>) -> Self {
        Self::Unauthorized {
            service: service.into(),
        }
    }

    /// Create a JSON deserialization error with path context.
    #[must_use]
    pub fn json_deserialization(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::JsonDeserialization {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an API error from a decoded failure payload.
    #[must_use]
    pub fn api<F>(status: u16, payload: F) -> Self
    where
        F: fmt::Debug + Send + Sync + 'static,
    {
        Self::Api {
            status,
            payload: ApiPayload::new(payload),
        }
    }

    /// Wrap a token request failure.
    #[must_use]
    pub fn token_request(service: impl Into<String>, source: Self) -> Self {
        Self::TokenRequest {
            service: service.into(),
            source: Box::new(source),
        }
    }

    /// Returns `true` if the request could not be built.
    #[must_use]
    pub const fn is_build(&self) -> bool {
        matches!(
            self,
            Self::InvalidUrl(_)
                | Self::Unauthorized { .. }
                | Self::MissingGrant { .. }
                | Self::InvalidRequest(_)
                | Self::JsonSerialization(_)
                | Self::FormSerialization(_)
        )
    }

    /// Returns `true` if the transport failed.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Tls(_) | Self::Timeout)
    }

    /// Returns `true` if the transport produced an unusable response.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self, Self::NilBody | Self::NonHttpResponse { .. })
    }

    /// Returns `true` if a payload did not have the expected shape.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::JsonDeserialization { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` if this is a connection error.
    #[must_use]
    pub const fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns the HTTP status code if this is an API error.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if this is a client error (4xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|s| (400..500).contains(&s))
    }

    /// Returns `true` if this is a server error (5xx).
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status().is_some_and(|s| (500..600).contains(&s))
    }

    /// Borrow the decoded failure payload of an API error as `F`.
    ///
    /// Returns `None` for other variants, or when `F` is not the descriptor's
    /// failure type.
    ///
    /// # Example
    ///
    /// ```ignore
    /// match client.send(&descriptor).await {
    ///     Ok(user) => println!("User: {user:?}"),
    ///     Err(e) => match e.api_payload::<ApiFailure>() {
    ///         Some(failure) => println!("API error: {}", failure.message),
    ///         None => println!("Error: {e}"),
    ///     },
    /// }
    /// ```
    #[must_use]
    pub fn api_payload<F: 'static>(&self) -> Option<&F> {
        match self {
            Self::Api { payload, .. } => payload.downcast_ref(),
            _ => None,
        }
    }
}
