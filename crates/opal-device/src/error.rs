//! Classified device protocol errors

use opal_types::TransientError;
use thiserror::Error;

/// Device protocol error type.
///
/// Classification happens here, once: network faults and deadline
/// breaches are transient and subject to the caller's retry policy;
/// protocol-level rejections are permanent and fail the workflow
/// immediately.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Network fault; a retry may succeed
    #[error("device unreachable: {0}")]
    Transient(String),

    /// The call's deadline elapsed; treated as transient
    #[error("device call timed out: {0}")]
    Timeout(String),

    /// The device rejected the request; retrying cannot help
    #[error("device rejected request: {0}")]
    Permanent(String),
}

impl TransientError for DeviceError {
    fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Transient(_) | DeviceError::Timeout(_))
    }
}

/// Result type for device protocol operations
pub type Result<T> = std::result::Result<T, DeviceError>;
