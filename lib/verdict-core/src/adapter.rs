//! The adapter chain: descriptor → transport-ready request.
//!
//! Adapters run in a fixed order, each receiving the builder produced by the
//! previous one:
//!
//! 1. [`Adapter::Method`] sets the verb.
//! 2. [`Adapter::Content`] encodes parameters (query for GET, body otherwise).
//! 3. [`Adapter::Authorization`] adds credentials.
//!
//! The adapters themselves are pure. [`build_request`] reads the credential
//! store once, before the chain runs, and hands the cached OAuth2 credentials
//! to the authorization adapter: when no token is cached it fails with
//! [`Error::Unauthorized`] instead of fetching one.

use bytes::Bytes;
use tracing::warn;

use crate::{
    ApiKeyPlace, AuthScheme, ContentType, CredentialStore, Credentials, Descriptor, Error, Method,
    Parameters, Request, RequestBuilder, Result, auth::basic_authorization, body::query_value,
};

/// One step of the build pipeline.
#[derive(Debug, Clone, Copy)]
pub enum Adapter<'a> {
    /// Set the HTTP method.
    Method(Method),
    /// Encode parameters according to method and content type.
    Content {
        /// Method of the request; GET parameters go to the query string.
        method: Method,
        /// Declared content type.
        content_type: ContentType,
        /// Parameters to encode.
        parameters: &'a Parameters,
    },
    /// Inject credentials.
    Authorization {
        /// Scheme of the descriptor.
        scheme: &'a AuthScheme,
        /// Cached OAuth2 credentials, read from the store by the caller.
        credentials: Option<&'a Credentials>,
    },
}

impl<'a> Adapter<'a> {
    /// The adapters for `descriptor`, in application order.
    #[must_use]
    pub fn chain<S, F>(
        descriptor: &'a Descriptor<S, F>,
        credentials: Option<&'a Credentials>,
    ) -> [Self; 3] {
        [
            Self::Method(descriptor.method()),
            Self::Content {
                method: descriptor.method(),
                content_type: descriptor.content_type(),
                parameters: descriptor.parameters(),
            },
            Self::Authorization {
                scheme: descriptor.authorization(),
                credentials,
            },
        ]
    }

    /// Apply this adapter.
    pub fn adapt(self, request: RequestBuilder<Bytes>) -> Result<RequestBuilder<Bytes>> {
        match self {
            Self::Method(method) => Ok(request.method(method)),
            Self::Content {
                method,
                content_type,
                parameters,
            } => encode_content(request, method, content_type, parameters),
            Self::Authorization {
                scheme,
                credentials,
            } => authorize(request, scheme, credentials),
        }
    }
}

/// A transport-ready request and the OAuth2 access token it was built with.
#[derive(Clone)]
pub struct BuiltRequest {
    /// The request.
    pub request: Request<Bytes>,
    /// Access token put in the `Authorization` header, for OAuth2 descriptors.
    pub access_token: Option<String>,
}

/// Run the adapter chain of `descriptor` on a bare request.
///
/// # Errors
///
/// - [`Error::InvalidUrl`] if the descriptor URL does not parse.
/// - [`Error::JsonSerialization`] / [`Error::FormSerialization`] if the body
///   cannot be encoded.
/// - [`Error::Unauthorized`] if an OAuth2 token is missing.
pub fn build_request<S, F>(
    descriptor: &Descriptor<S, F>,
    store: &dyn CredentialStore,
) -> Result<BuiltRequest> {
    let url = url::Url::parse(descriptor.url())?;
    let credentials = descriptor
        .authorization()
        .oauth2_service()
        .and_then(|service| Credentials::load(store, service));
    let bare = RequestBuilder::new(Method::Get, url);

    let request = Adapter::chain(descriptor, credentials.as_ref())
        .into_iter()
        .try_fold(bare, |request, adapter| adapter.adapt(request))?
        .build();

    Ok(BuiltRequest {
        request,
        access_token: credentials.map(|credentials| credentials.access_token),
    })
}

fn encode_content(
    mut request: RequestBuilder<Bytes>,
    method: Method,
    content_type: ContentType,
    parameters: &Parameters,
) -> Result<RequestBuilder<Bytes>> {
    if method.uses_query() {
        for (key, value) in parameters {
            request = match query_value(value) {
                Some(value) => request.query(key, &value),
                None => request.query_key(key),
            };
        }
        return Ok(request);
    }

    match content_type {
        ContentType::Json => request.json(parameters),
        ContentType::FormUrlEncoded => request.form(parameters),
        ContentType::None | ContentType::FormData | ContentType::Xml => {
            if !parameters.is_empty() {
                warn!(
                    %content_type,
                    count = parameters.len(),
                    "no body encoder for content type, parameters are not sent"
                );
            }
            Ok(match content_type.mime() {
                Some(mime) => request.header("Content-Type", mime),
                None => request,
            })
        }
    }
}

fn authorize(
    request: RequestBuilder<Bytes>,
    scheme: &AuthScheme,
    credentials: Option<&Credentials>,
) -> Result<RequestBuilder<Bytes>> {
    match scheme {
        AuthScheme::NoAuth | AuthScheme::Jwt => Ok(request),
        AuthScheme::ApiKey { key, value, place } => Ok(match place {
            ApiKeyPlace::Header => request.header(key.as_str(), value.as_str()),
            ApiKeyPlace::Query => request.query(key, value),
        }),
        AuthScheme::BasicAuth { user, password } => {
            Ok(request.header("Authorization", basic_authorization(user, password)))
        }
        AuthScheme::OAuth2PasswordGrant { service } => {
            let credentials = credentials.ok_or_else(|| Error::unauthorized(service))?;
            Ok(request.header("Authorization", credentials.authorization()))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use assert2::{check, let_assert};
    use serde_json::{Value, json};

    use super::*;
    use crate::MemoryCredentialStore;

    fn query_set(request: &Request<Bytes>) -> HashSet<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn get_parameters_go_to_query() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com/search")
            .param("text", "cats")
            .param("per_page", 30)
            .param("safe", true)
            .content_type(ContentType::Json)
            .build();

        let request = build_request(&descriptor, &MemoryCredentialStore::new())
            .expect("build")
            .request;

        check!(request.method() == Method::Get);
        check!(request.body().is_none());
        check!(request.header("Content-Type").is_none());
        let expected: HashSet<(String, String)> = [
            ("text".to_string(), "cats".to_string()),
            ("per_page".to_string(), "30".to_string()),
            ("safe".to_string(), "true".to_string()),
        ]
        .into_iter()
        .collect();
        check!(query_set(&request) == expected);
    }

    #[test]
    fn get_keeps_existing_query() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com/search?format=json")
            .param("text", "cats")
            .build();

        let request = build_request(&descriptor, &MemoryCredentialStore::new())
            .expect("build")
            .request;

        check!(query_set(&request).contains(&("format".to_string(), "json".to_string())));
        check!(query_set(&request).contains(&("text".to_string(), "cats".to_string())));
    }

    #[test]
    fn json_body_matches_parameters() {
        let descriptor = Descriptor::<Value>::builder(Method::Put, "https://api.example.com/users/1")
            .param("name", "Alice")
            .param("tags", json!(["a", "b"]))
            .param("profile", json!({ "age": 30 }))
            .content_type(ContentType::Json)
            .build();

        let request = build_request(&descriptor, &MemoryCredentialStore::new())
            .expect("build")
            .request;

        check!(request.method() == Method::Put);
        check!(request.header("Content-Type") == Some("application/json"));
        let_assert!(Some(body) = request.body());
        let decoded: Value = serde_json::from_slice(body).expect("json body");
        check!(decoded == Value::Object(descriptor.parameters().clone()));
        check!(request.url().query().is_none());
    }

    #[test]
    fn form_body_is_percent_encoded() {
        let descriptor = Descriptor::<Value>::post("https://auth.example.com/token")
            .param("grant_type", "password")
            .param("password", "p&ss=word")
            .content_type(ContentType::FormUrlEncoded)
            .build();

        let request = build_request(&descriptor, &MemoryCredentialStore::new())
            .expect("build")
            .request;

        check!(request.header("Content-Type") == Some("application/x-www-form-urlencoded"));
        let_assert!(Some(body) = request.body());
        let body = std::str::from_utf8(body).expect("utf8");
        check!(body.contains("grant_type=password"));
        check!(body.contains("password=p%26ss%3Dword"));
    }

    #[test]
    fn unencoded_content_types_pass_through() {
        for content_type in [ContentType::FormData, ContentType::Xml] {
            let descriptor = Descriptor::<Value>::post("https://api.example.com/upload")
                .param("file", "data")
                .content_type(content_type)
                .build();

            let request = build_request(&descriptor, &MemoryCredentialStore::new())
                .expect("build")
                .request;

            check!(request.body().is_none());
            check!(request.header("Content-Type") == content_type.mime());
        }
    }

    #[test]
    fn invalid_url_is_build_error() {
        let descriptor = Descriptor::<Value>::get("not a url").build();
        let result = build_request(&descriptor, &MemoryCredentialStore::new());

        let_assert!(Err(Error::InvalidUrl(_)) = result);
    }

    #[test]
    fn api_key_in_header_and_query() {
        let store = MemoryCredentialStore::new();

        let descriptor = Descriptor::<Value>::get("https://api.example.com/photos")
            .authorization(AuthScheme::api_key_header("X-Api-Key", "k1"))
            .build();
        let request = build_request(&descriptor, &store).expect("build").request;
        check!(request.header("X-Api-Key") == Some("k1"));

        let descriptor = Descriptor::<Value>::get("https://api.example.com/photos")
            .param("page", "1")
            .authorization(AuthScheme::api_key_query("api_key", "k2"))
            .build();
        let request = build_request(&descriptor, &store).expect("build").request;
        check!(query_set(&request).contains(&("api_key".to_string(), "k2".to_string())));
        check!(query_set(&request).contains(&("page".to_string(), "1".to_string())));
    }

    #[test]
    fn basic_auth_header() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com/me")
            .authorization(AuthScheme::basic("user", "pass"))
            .build();

        let request = build_request(&descriptor, &MemoryCredentialStore::new())
            .expect("build")
            .request;

        check!(request.header("Authorization") == Some("Basic dXNlcjpwYXNz"));
    }

    #[test]
    fn oauth2_uses_cached_token() {
        let store = MemoryCredentialStore::new();
        Credentials {
            token_type: "Bearer".to_string(),
            access_token: "tok".to_string(),
            refresh_token: None,
        }
        .persist(&store, "github");

        let descriptor = Descriptor::<Value>::get("https://api.example.com/me")
            .authorization(AuthScheme::oauth2("github"))
            .build();
        let built = build_request(&descriptor, &store).expect("build");

        check!(built.request.header("Authorization") == Some("Bearer tok"));
        check!(built.access_token.as_deref() == Some("tok"));
    }

    #[test]
    fn oauth2_without_token_is_unauthorized() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com/me")
            .authorization(AuthScheme::oauth2("github"))
            .build();

        let result = build_request(&descriptor, &MemoryCredentialStore::new());

        let_assert!(Err(Error::Unauthorized { service }) = result);
        check!(service == "github");
    }

    #[test]
    fn jwt_and_no_auth_leave_request_untouched() {
        for scheme in [AuthScheme::NoAuth, AuthScheme::Jwt] {
            let descriptor = Descriptor::<Value>::get("https://api.example.com/me")
                .authorization(scheme)
                .build();
            let built =
                build_request(&descriptor, &MemoryCredentialStore::new()).expect("build");
            check!(built.request.headers().is_empty());
            check!(built.access_token.is_none());
        }
    }
}
