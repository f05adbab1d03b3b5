//! Client Error Types

use thiserror::Error;

/// Result type alias for backend queries
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors from the backend query endpoints.
///
/// Activation failures never appear here: the `SubscriptionActivator`
/// boundary normalizes those straight into `ActivationError` so the flow
/// can classify them without knowing about HTTP.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Transport-level failure before any response arrived
    #[error("Backend request failed: {0}")]
    Http(String),

    /// Backend answered with a non-success status
    #[error("Backend error ({status}): {detail}")]
    Api { status: u16, detail: String },

    /// Response body did not match the expected shape
    #[error("Backend response decode failed: {0}")]
    Decode(String),

    /// Client misconfiguration
    #[error("Configuration error: {0}")]
    Config(String),
}
