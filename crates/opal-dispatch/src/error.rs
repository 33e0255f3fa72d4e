//! Dispatcher error types

use opal_types::{CorrelationId, DeviceId, TenantId};
use thiserror::Error;

/// Errors surfaced synchronously by the task dispatcher.
///
/// Everything that happens after a request is accepted is reported
/// through its completion record instead.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// A workflow is already running for this (tenant, device)
    #[error("workflow already in progress for device {device} of tenant {tenant}")]
    AlreadyInProgress { tenant: TenantId, device: DeviceId },

    /// No live workflow matches the correlation id
    #[error("no active workflow for correlation {0}")]
    UnknownCorrelation(CorrelationId),
}

/// Result type for dispatcher operations
pub type Result<T> = std::result::Result<T, DispatchError>;
