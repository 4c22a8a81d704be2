//! Collaborator traits.
//!
//! - [`HttpClient`] - executes a built request
//! - [`TokenRefresher`] - renews an OAuth2 access token for a service
//!
//! The `verdict` crate provides a hyper-based [`HttpClient`] and implements
//! [`TokenRefresher`] with its token manager. Implement them yourself for
//! custom transports or for testing.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;

use crate::{RawResponse, Request, Result};

/// A boxed, `Send` future borrowing for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport used to execute requests.
///
/// Implementations resolve exactly once per call. A response without a body
/// is reported as `body == None` rather than an error; the caller decides
/// what that means.
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request and return the raw response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Timeouts
    fn execute(&self, request: Request<Bytes>) -> impl Future<Output = Result<RawResponse>> + Send;
}

/// Renews the access token of a service.
///
/// Returns a boxed future so implementations may send requests through the
/// same client that evaluates decisions.
pub trait TokenRefresher: Send + Sync {
    /// Refresh the token of `service`.
    ///
    /// `stale_token` is the access token the rejected request carried. An
    /// implementation may skip the refresh if the stored token has already
    /// changed.
    fn refresh<'a>(
        &'a self,
        service: &'a str,
        stale_token: Option<&'a str>,
    ) -> BoxFuture<'a, Result<()>>;
}
