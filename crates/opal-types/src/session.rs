//! Device sessions and workflow kinds
//!
//! A DeviceSession is the ephemeral record of one running workflow. It is
//! owned exclusively by the state machine driving it and dropped on the
//! terminal transition. At most one live session exists per
//! (tenant, device) at any time; the session registry enforces that.

use crate::{DeviceId, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The workflow a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowKind {
    /// Bring the device under management
    Activation,
    /// Release the device from management
    Deactivation,
    /// One short, single-purpose maintenance task
    Maintenance(MaintenanceKind),
}

impl WorkflowKind {
    /// Stable task name surfaced in completion records and audit topics
    pub fn task_name(&self) -> &'static str {
        match self {
            WorkflowKind::Activation => "activation",
            WorkflowKind::Deactivation => "deactivation",
            WorkflowKind::Maintenance(kind) => kind.task_name(),
        }
    }
}

impl std::fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.task_name())
    }
}

/// Maintenance task family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaintenanceKind {
    /// Synchronize the device clock
    SyncClock,
    /// Synchronize the device hostname
    SyncHostname,
    /// Refresh the device network address
    SyncNetworkAddress,
    /// Rotate the device admin password
    RotateAdminPassword,
    /// Renew the device TLS certificate
    RenewTlsCertificate,
}

impl MaintenanceKind {
    pub fn task_name(&self) -> &'static str {
        match self {
            MaintenanceKind::SyncClock => "syncclock",
            MaintenanceKind::SyncHostname => "synchostname",
            MaintenanceKind::SyncNetworkAddress => "syncnetworkaddress",
            MaintenanceKind::RotateAdminPassword => "changepassword",
            MaintenanceKind::RenewTlsCertificate => "renewtls",
        }
    }
}

/// Ephemeral record of one running workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSession {
    /// Device the workflow operates on
    pub device_id: DeviceId,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Workflow kind
    pub kind: WorkflowKind,

    /// Assigned profile name, when the workflow needs one
    pub profile_name: Option<String>,

    /// Name of the state currently executing
    pub current_state: String,

    /// Retries consumed so far, keyed by operation name
    pub retry_counts: HashMap<String, u32>,

    /// Session start timestamp
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl DeviceSession {
    /// Open a fresh session positioned at the Start state.
    pub fn new(
        device_id: DeviceId,
        tenant_id: TenantId,
        kind: WorkflowKind,
        profile_name: Option<String>,
    ) -> Self {
        Self {
            device_id,
            tenant_id,
            kind,
            profile_name,
            current_state: "Start".to_string(),
            retry_counts: HashMap::new(),
            started_at: chrono::Utc::now(),
        }
    }

    /// Record entry into a state
    pub fn enter_state(&mut self, state: &str) {
        self.current_state = state.to_string();
    }

    /// Record one consumed retry for an operation
    pub fn note_retry(&mut self, operation: &str) {
        *self.retry_counts.entry(operation.to_string()).or_insert(0) += 1;
    }

    /// Retries consumed by an operation so far
    pub fn retries_for(&self, operation: &str) -> u32 {
        self.retry_counts.get(operation).copied().unwrap_or(0)
    }
}
