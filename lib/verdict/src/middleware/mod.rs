//! Tower middleware layers for the hyper transport.
//!
//! Layers wrap the transport, below the decision chain: they see every
//! resend individually. Add them with [`HyperClientBuilder::layer`].
//!
//! - [`LoggingLayer`] - Logs requests/responses using `tracing`
//!
//! [`HyperClientBuilder::layer`]: crate::HyperClientBuilder::layer

mod logging;

pub use logging::{LogLevel, Logging, LoggingLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
