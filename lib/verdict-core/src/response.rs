//! HTTP response handling.
//!
//! Transports hand back a [`RawResponse`] whose body may be missing. The
//! client checks it with [`RawResponse::into_complete`] before the decision
//! chain sees a [`Response`].

use std::collections::HashMap;
use std::ops::RangeInclusive;

use bytes::Bytes;

use crate::{Error, Result};

/// Status codes a real HTTP response can carry.
const HTTP_STATUS_RANGE: RangeInclusive<u16> = 100..=599;

/// What a transport produced: the body may be absent.
pub type RawResponse = Response<Option<Bytes>>;

/// HTTP response with status, headers, and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<B = Bytes> {
    status: u16,
    headers: HashMap<String, String>,
    body: B,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: u16, headers: HashMap<String, String>, body: B) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Status is 2xx.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

impl Response<Option<Bytes>> {
    /// Check that the transport produced a usable HTTP response.
    ///
    /// # Errors
    ///
    /// - [`Error::NilBody`] when there is no body.
    /// - [`Error::NonHttpResponse`] when the status is outside `100..=599`.
    pub fn into_complete(self) -> Result<Response<Bytes>> {
        let Some(body) = self.body else {
            return Err(Error::NilBody);
        };
        if !HTTP_STATUS_RANGE.contains(&self.status) {
            return Err(Error::NonHttpResponse {
                status: self.status,
            });
        }
        Ok(Response {
            status: self.status,
            headers: self.headers,
            body,
        })
    }
}
