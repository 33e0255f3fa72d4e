//! Error types for the store seam

use opal_types::TransientError;
use thiserror::Error;

/// Store error type.
///
/// "Missing" is not an error here; lookups return `Ok(None)`. Only
/// infrastructure failure surfaces as an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing store unreachable or failing
    #[error("persistence unavailable: {0}")]
    Unavailable(String),
}

impl TransientError for StoreError {
    fn is_transient(&self) -> bool {
        // An unreachable store may come back; a retry is worth the budget.
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
