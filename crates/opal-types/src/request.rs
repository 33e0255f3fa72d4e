//! Workflow submission requests

use crate::{DeviceId, TenantId, WorkflowKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request accepted by the task dispatcher.
///
/// The dispatcher returns a correlation handle synchronously and exactly
/// one `CompletionRecord` asynchronously, unless the request is rejected
/// outright because a workflow is already in progress for the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRequest {
    /// Target device
    pub device_id: DeviceId,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Which workflow to run
    pub workflow_kind: WorkflowKind,

    /// Profile to apply; required for activation, ignored elsewhere unless
    /// a maintenance task needs it
    pub profile_name: Option<String>,

    /// Free-form task parameters (for example the hostname to synchronize)
    #[serde(default)]
    pub parameters: HashMap<String, String>,
}

impl WorkflowRequest {
    pub fn new(device_id: DeviceId, tenant_id: TenantId, workflow_kind: WorkflowKind) -> Self {
        Self {
            device_id,
            tenant_id,
            workflow_kind,
            profile_name: None,
            parameters: HashMap::new(),
        }
    }

    pub fn with_profile(mut self, profile_name: impl Into<String>) -> Self {
        self.profile_name = Some(profile_name.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builder() {
        let request = WorkflowRequest::new(
            DeviceId::new("D1"),
            TenantId::new("t1"),
            WorkflowKind::Activation,
        )
        .with_profile("P1")
        .with_parameter("hostname", "edge-7");

        assert_eq!(request.profile_name.as_deref(), Some("P1"));
        assert_eq!(request.parameters.get("hostname").map(String::as_str), Some("edge-7"));
    }
}
