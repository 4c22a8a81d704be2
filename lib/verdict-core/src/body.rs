//! Body serialization utilities.

use bytes::Bytes;
use serde_json::Value;

use crate::Result;

/// Content type declared by a descriptor for its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContentType {
    /// No content type; no `Content-Type` header and no body encoding.
    #[default]
    None,
    /// Multipart form data (`multipart/form-data`).
    ///
    /// No encoder: the header is set but the body is left untouched.
    FormData,
    /// Form URL-encoded content type (`application/x-www-form-urlencoded`).
    FormUrlEncoded,
    /// JSON content type (`application/json`).
    Json,
    /// XML content type (`application/xml`).
    ///
    /// No encoder: the header is set but the body is left untouched.
    Xml,
}

impl ContentType {
    /// Get the MIME type string, `None` for [`ContentType::None`].
    #[must_use]
    pub const fn mime(&self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::FormData => Some("multipart/form-data"),
            Self::FormUrlEncoded => Some("application/x-www-form-urlencoded"),
            Self::Json => Some("application/json"),
            Self::Xml => Some("application/xml"),
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mime().unwrap_or("none"))
    }
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
///
/// # Example
///
/// ```
/// use verdict_core::to_json;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct User { name: String }
///
/// let user = User { name: "Alice".to_string() };
/// let bytes = to_json(&user).expect("serialize");
/// assert_eq!(bytes.as_ref(), br#"{"name":"Alice"}"#);
/// ```
pub fn to_json<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Serialize a value to percent-encoded form bytes.
///
/// # Errors
///
/// Returns an error if form serialization fails (e.g. nested objects).
///
/// # Example
///
/// ```
/// use verdict_core::to_form;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Login { username: String, password: String }
///
/// let login = Login { username: "alice".to_string(), password: "p&ss word".to_string() };
/// let bytes = to_form(&login).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"username=alice&password=p%26ss+word");
/// ```
pub fn to_form<T: serde::Serialize>(value: &T) -> Result<Bytes> {
    serde_html_form::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(Into::into)
}

/// Render a parameter value for use in a query string.
///
/// Strings are used verbatim, `null` yields `None` (a key-only pair), and
/// every other value uses its JSON text.
#[must_use]
pub fn query_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Deserialize JSON bytes to a value with path-aware error messages.
///
/// # Errors
///
/// Returns an error if JSON deserialization fails, with the error message
/// including the path to the problematic field (e.g., "user.address.city").
///
/// # Example
///
/// ```
/// use verdict_core::from_json;
/// use serde::Deserialize;
///
/// #[derive(Debug, PartialEq, Deserialize)]
/// struct User { name: String }
///
/// let bytes = br#"{"name":"Alice"}"#;
/// let user: User = from_json(bytes).expect("deserialize");
/// assert_eq!(user, User { name: "Alice".to_string() });
/// ```
pub fn from_json<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    let value = serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        crate::Error::json_deserialization(e.path().to_string(), e.inner().to_string())
    })?;
    // only whitespace may follow the value
    deserializer
        .end()
        .map_err(|e| crate::Error::json_deserialization("", e.to_string()))?;
    Ok(value)
}
