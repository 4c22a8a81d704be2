//! Prelude module for convenient imports.
//!
//! ```
//! use verdict_core::prelude::*;
//! ```

pub use crate::{
    AuthScheme, ContentType, CredentialStore, Decision, Decisions, Descriptor, Error, HttpClient,
    Method, Request, Response, Result,
};
