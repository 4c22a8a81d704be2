//! Authorization schemes carried by descriptors.

use base64::Engine;

/// Where an API key is placed on the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiKeyPlace {
    /// As a request header named after the key.
    Header,
    /// As a URL query parameter.
    Query,
}

/// How a descriptor authenticates its request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthScheme {
    /// No authentication.
    #[default]
    NoAuth,
    /// A static API key.
    ApiKey {
        /// Header or query parameter name.
        key: String,
        /// Key value.
        value: String,
        /// Header or query.
        place: ApiKeyPlace,
    },
    /// HTTP basic authentication.
    BasicAuth {
        /// User name.
        user: String,
        /// Password.
        password: String,
    },
    /// OAuth2 password grant; the token is read from the credential store.
    OAuth2PasswordGrant {
        /// Service name, used as credential-store key prefix.
        service: String,
    },
    /// JWT bearer; no token source is wired, the request is sent as is.
    Jwt,
}

impl AuthScheme {
    /// API key in a header.
    #[must_use]
    pub fn api_key_header(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            value: value.into(),
            place: ApiKeyPlace::Header,
        }
    }

    /// API key in the query string.
    #[must_use]
    pub fn api_key_query(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ApiKey {
            key: key.into(),
            value: value.into(),
            place: ApiKeyPlace::Query,
        }
    }

    /// HTTP basic authentication.
    #[must_use]
    pub fn basic(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self::BasicAuth {
            user: user.into(),
            password: password.into(),
        }
    }

    /// OAuth2 password grant for `service`.
    #[must_use]
    pub fn oauth2(service: impl Into<String>) -> Self {
        Self::OAuth2PasswordGrant {
            service: service.into(),
        }
    }

    /// The OAuth2 service name, if this is an OAuth2 scheme.
    #[must_use]
    pub fn oauth2_service(&self) -> Option<&str> {
        match self {
            Self::OAuth2PasswordGrant { service } => Some(service),
            _ => None,
        }
    }
}

/// `Basic <base64(user:password)>` header value.
#[must_use]
pub fn basic_authorization(user: &str, password: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    format!("Basic {encoded}")
}
