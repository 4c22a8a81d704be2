//! Request descriptors.
//!
//! A [`Descriptor`] declares one logical call: where it goes, how its
//! parameters travel, how it authenticates, and which types the success and
//! failure payloads decode into.
//!
//! # Example
//!
//! ```
//! use verdict_core::{AuthScheme, Descriptor, Method};
//!
//! #[derive(serde::Deserialize)]
//! struct Photos { total: u32 }
//!
//! let search = Descriptor::<Photos>::builder(Method::Get, "https://api.example.com/search")
//!     .param("text", "cats")
//!     .param("per_page", 30)
//!     .authorization(AuthScheme::api_key_query("api_key", "secret"))
//!     .build();
//! assert_eq!(search.parameters().len(), 2);
//! ```

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};

use crate::{AuthScheme, ContentType, Decisions, Error, Method, Result};

/// Parameter map of a descriptor. Key order carries no meaning.
pub type Parameters = Map<String, Value>;

/// Declarative description of one HTTP call.
///
/// `S` is the success payload type, `F` the failure payload type decoded from
/// non-2xx responses.
pub struct Descriptor<S, F = Value> {
    url: String,
    method: Method,
    parameters: Parameters,
    content_type: ContentType,
    authorization: AuthScheme,
    decisions: Option<Decisions>,
    payloads: PhantomData<fn() -> (S, F)>,
}

impl<S, F> Descriptor<S, F> {
    /// Creates a new [`DescriptorBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: impl Into<String>) -> DescriptorBuilder<S, F> {
        DescriptorBuilder::new(method, url)
    }

    /// Shorthand for a GET builder.
    #[must_use]
    pub fn get(url: impl Into<String>) -> DescriptorBuilder<S, F> {
        Self::builder(Method::Get, url)
    }

    /// Shorthand for a POST builder.
    #[must_use]
    pub fn post(url: impl Into<String>) -> DescriptorBuilder<S, F> {
        Self::builder(Method::Post, url)
    }

    /// Target URL, parsed when the request is built.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Parameters.
    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// Content type of the parameters.
    #[must_use]
    pub const fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Authorization scheme.
    #[must_use]
    pub fn authorization(&self) -> &AuthScheme {
        &self.authorization
    }

    /// Decisions to run: the custom list if one was set, else the default
    /// pipeline with `retry_budget` retries.
    #[must_use]
    pub fn decisions(&self, retry_budget: u32) -> Decisions {
        self.decisions
            .clone()
            .unwrap_or_else(|| Decisions::default_pipeline(retry_budget))
    }
}

impl<S, F> Clone for Descriptor<S, F> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method,
            parameters: self.parameters.clone(),
            content_type: self.content_type,
            authorization: self.authorization.clone(),
            decisions: self.decisions.clone(),
            payloads: PhantomData,
        }
    }
}

impl<S, F> fmt::Debug for Descriptor<S, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("content_type", &self.content_type)
            .field("parameters", &self.parameters.len())
            .field("custom_decisions", &self.decisions.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`Descriptor`].
pub struct DescriptorBuilder<S, F = Value> {
    descriptor: Descriptor<S, F>,
}

impl<S, F> DescriptorBuilder<S, F> {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            descriptor: Descriptor {
                url: url.into(),
                method,
                parameters: Parameters::new(),
                content_type: ContentType::None,
                authorization: AuthScheme::NoAuth,
                decisions: None,
                payloads: PhantomData,
            },
        }
    }

    /// Sets one parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.descriptor.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds every entry of `parameters`.
    #[must_use]
    pub fn parameters(mut self, parameters: Parameters) -> Self {
        self.descriptor.parameters.extend(parameters);
        self
    }

    /// Adds the fields of a serializable struct as parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` does not serialize to a JSON object.
    pub fn serialize_parameters<T: serde::Serialize>(mut self, value: &T) -> Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => {
                self.descriptor.parameters.extend(map);
                Ok(self)
            }
            other => Err(Error::invalid_request(format!(
                "parameters must serialize to an object, got {other}"
            ))),
        }
    }

    /// Sets the content type.
    #[must_use]
    pub fn content_type(mut self, content_type: ContentType) -> Self {
        self.descriptor.content_type = content_type;
        self
    }

    /// Sets the authorization scheme.
    #[must_use]
    pub fn authorization(mut self, authorization: AuthScheme) -> Self {
        self.descriptor.authorization = authorization;
        self
    }

    /// Replaces the default decision pipeline.
    #[must_use]
    pub fn decisions(mut self, decisions: Decisions) -> Self {
        self.descriptor.decisions = Some(decisions);
        self
    }

    /// Builds the [`Descriptor`].
    #[must_use]
    pub fn build(self) -> Descriptor<S, F> {
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::Decision;

    #[test]
    fn builder_defaults() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com").build();

        assert_eq!(descriptor.method(), Method::Get);
        assert_eq!(descriptor.content_type(), ContentType::None);
        assert_eq!(descriptor.authorization(), &AuthScheme::NoAuth);
        assert!(descriptor.parameters().is_empty());
    }

    #[test]
    fn default_decisions_use_retry_budget() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com").build();
        let names: Vec<String> = descriptor.decisions(3).iter().map(ToString::to_string).collect();

        assert_eq!(
            names,
            [
                "refresh-token",
                "retry(3)",
                "bad-response-status-code",
                "data-mapping",
                "parse-result"
            ]
        );
    }

    #[test]
    fn custom_decisions_replace_default() {
        let descriptor = Descriptor::<Value>::get("https://api.example.com")
            .decisions(Decisions::from(vec![Decision::ParseResult]))
            .build();

        assert_eq!(descriptor.decisions(2).len(), 1);
    }

    #[test]
    fn serialize_parameters_from_struct() {
        #[derive(serde::Serialize)]
        struct Login<'a> {
            username: &'a str,
            password: &'a str,
        }

        let descriptor = Descriptor::<Value>::post("https://auth.example.com/token")
            .serialize_parameters(&Login {
                username: "alice",
                password: "secret",
            })
            .expect("object")
            .build();

        assert_eq!(descriptor.parameters().get("username"), Some(&json!("alice")));
        assert_eq!(descriptor.parameters().len(), 2);
    }

    #[test]
    fn serialize_parameters_rejects_non_objects() {
        let result = Descriptor::<Value>::post("https://api.example.com").serialize_parameters(&[1, 2]);
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }
}
