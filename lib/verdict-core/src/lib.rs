//! Core types and traits for verdict.
//!
//! This crate provides the pieces that do not need a runtime:
//! - [`Descriptor`] - declarative description of one call
//! - [`Adapter`] and [`build_request`] - descriptor to transport-ready request
//! - [`Decision`], [`Decisions`] and [`evaluate`] - response processing
//! - [`CredentialStore`] and [`Credentials`] - per-service token storage
//! - [`Error`] and [`Result`] - error handling
//! - [`HttpClient`] and [`TokenRefresher`] - collaborator traits
//! - [`StatusCode`] - HTTP status codes (re-exported from `http` crate)

mod adapter;
mod auth;
mod body;
mod chain;
mod client;
mod credential;
mod decision;
mod descriptor;
mod error;
mod method;
pub mod prelude;
mod request;
mod response;

pub use adapter::{Adapter, BuiltRequest, build_request};
pub use auth::{ApiKeyPlace, AuthScheme, basic_authorization};
pub use body::{ContentType, from_json, query_value, to_form, to_json};
pub use chain::{Verdict, evaluate};
pub use client::{BoxFuture, HttpClient, TokenRefresher};
pub use credential::{CredentialStore, Credentials, MemoryCredentialStore};
pub use decision::{
    DataMapping, Decision, DecisionAction, DecisionContext, Decisions, MappingCondition,
    MappingTransform,
};
pub use descriptor::{Descriptor, DescriptorBuilder, Parameters};
pub use error::{ApiPayload, Error, Result};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::{RawResponse, Response};

// Re-export http crate types for status codes and headers
pub use http::{StatusCode, header};
