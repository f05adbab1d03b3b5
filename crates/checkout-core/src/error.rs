//! Error Types

use thiserror::Error;

/// Result type alias for activation attempts
pub type Result<T> = std::result::Result<T, ActivationError>;

/// Failures detected while parsing the hosted-checkout redirect parameters.
///
/// These are terminal for the flow: a malformed redirect cannot be repaired
/// by retrying, so no activation attempt is ever made for it.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Session id missing, empty, or still the unexpanded redirect placeholder
    #[error("Invalid or missing session id")]
    InvalidSessionId,

    /// Plan key outside the recognized set
    #[error("Unrecognized plan: {0}")]
    UnrecognizedPlan(String),
}

/// Failure of a single activation attempt.
///
/// Every failure reaching the retry policy is one of these variants; the
/// activator boundary normalizes transport and collaborator errors into
/// [`ActivationError::Transient`], and the timeout supervisor produces
/// [`ActivationError::Timeout`]. No string matching is ever needed to
/// classify an error.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum ActivationError {
    /// Redirect parameters failed validation
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// Network or collaborator-reported failure
    #[error("{detail}")]
    Transient { detail: String },

    /// The activation deadline elapsed before the collaborator answered
    #[error("Activation timed out")]
    Timeout,
}

impl ActivationError {
    /// Shorthand for a transient failure with the given detail
    pub fn transient(detail: impl Into<String>) -> Self {
        ActivationError::Transient {
            detail: detail.into(),
        }
    }

    /// Check if the retry policy may spend its automatic retry on this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ActivationError::Transient { .. } | ActivationError::Timeout
        )
    }

    /// Human-readable detail string surfaced to display surfaces
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<anyhow::Error> for ActivationError {
    fn from(err: anyhow::Error) -> Self {
        ActivationError::transient(err.to_string())
    }
}
