//! Prelude module for convenient imports.
//!
//! ```
//! use verdict::prelude::*;
//! ```

pub use crate::{
    ApiClient, AuthScheme, ContentType, CredentialStore, Decision, Decisions, Descriptor, Error,
    HttpClient, HyperClient, Method, PasswordGrant, Result, SendPolicy,
};
pub use serde::{Deserialize, Serialize};
