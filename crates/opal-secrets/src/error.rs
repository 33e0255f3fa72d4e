//! Error types for the secret gateway seam

use opal_types::TransientError;
use thiserror::Error;

/// Secret gateway error type.
///
/// "Not found" and "unavailable" fail distinctly: the former is a
/// configuration problem, the latter may pass on retry.
#[derive(Debug, Error)]
pub enum SecretError {
    /// No secret at the requested path
    #[error("secret not found at {0}")]
    NotFound(String),

    /// Gateway unreachable or failing
    #[error("secret gateway unavailable: {0}")]
    Unavailable(String),
}

impl TransientError for SecretError {
    fn is_transient(&self) -> bool {
        matches!(self, SecretError::Unavailable(_))
    }
}

/// Result type for secret gateway operations
pub type Result<T> = std::result::Result<T, SecretError>;
