//! Scriptable in-memory device
//!
//! A stateful fake device for development and tests. Each operation can be
//! scripted to fail transiently N times, fail permanently, or time out;
//! unscripted operations succeed. Every call lands in a recorded log so
//! tests can assert exactly which protocol operations were issued.

use crate::client::{
    AclEntry, CertificatePayload, ControlMode, DeviceClient, UnprovisionOutcome,
};
use crate::error::{DeviceError, Result};
use async_trait::async_trait;
use opal_types::{CiraConfig, DeviceId, Dot1xConfig, TlsMode, WiredConfig, WirelessConfig};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::trace;

/// One scripted response for an operation
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Succeed normally
    Ok,
    /// Fail with a transient error
    Transient(&'static str),
    /// Fail with a deadline breach
    Timeout,
    /// Fail with a permanent protocol rejection
    Permanent(&'static str),
}

struct ScriptedState {
    mode: ControlMode,
    scripts: HashMap<&'static str, VecDeque<ScriptStep>>,
    calls: Vec<String>,
}

/// Scriptable fake device
pub struct ScriptedDeviceClient {
    state: Mutex<ScriptedState>,
}

impl ScriptedDeviceClient {
    /// New device in factory state
    pub fn new() -> Self {
        Self::with_control_mode(ControlMode::PreProvisioning)
    }

    /// New device reporting the given control mode
    pub fn with_control_mode(mode: ControlMode) -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                mode,
                scripts: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Script the next responses for an operation, consumed in order;
    /// once the script runs out the operation succeeds again.
    pub fn script(&self, operation: &'static str, steps: impl IntoIterator<Item = ScriptStep>) {
        let mut state = self.state.lock().unwrap();
        state
            .scripts
            .entry(operation)
            .or_default()
            .extend(steps);
    }

    /// Force the reported control mode
    pub fn set_control_mode(&self, mode: ControlMode) {
        self.state.lock().unwrap().mode = mode;
    }

    /// Snapshot of every operation issued so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Count of calls for one operation
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    fn step(&self, operation: &'static str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(operation.to_string());
        trace!(operation = operation, "Scripted device call");
        let step = state
            .scripts
            .get_mut(operation)
            .and_then(|queue| queue.pop_front())
            .unwrap_or(ScriptStep::Ok);
        match step {
            ScriptStep::Ok => Ok(()),
            ScriptStep::Transient(reason) => Err(DeviceError::Transient(reason.to_string())),
            ScriptStep::Timeout => Err(DeviceError::Timeout(operation.to_string())),
            ScriptStep::Permanent(reason) => Err(DeviceError::Permanent(reason.to_string())),
        }
    }
}

impl Default for ScriptedDeviceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceClient for ScriptedDeviceClient {
    async fn control_mode(&self, _device: &DeviceId) -> Result<ControlMode> {
        self.step("control_mode")?;
        Ok(self.state.lock().unwrap().mode)
    }

    async fn set_admin_acl(&self, _device: &DeviceId, _entry: AclEntry) -> Result<()> {
        self.step("set_admin_acl")
    }

    async fn configure_wired(&self, _device: &DeviceId, _settings: &WiredConfig) -> Result<()> {
        self.step("configure_wired")
    }

    async fn configure_wireless(
        &self,
        _device: &DeviceId,
        _settings: &WirelessConfig,
    ) -> Result<()> {
        self.step("configure_wireless")
    }

    async fn configure_dot1x(&self, _device: &DeviceId, _settings: &Dot1xConfig) -> Result<()> {
        self.step("configure_dot1x")
    }

    async fn configure_cira(&self, _device: &DeviceId, _settings: &CiraConfig) -> Result<()> {
        self.step("configure_cira")
    }

    async fn install_certificate(
        &self,
        _device: &DeviceId,
        _payload: CertificatePayload,
    ) -> Result<()> {
        self.step("install_certificate")
    }

    async fn set_tls_mode(&self, _device: &DeviceId, _mode: TlsMode) -> Result<()> {
        self.step("set_tls_mode")
    }

    async fn unprovision(&self, _device: &DeviceId) -> Result<UnprovisionOutcome> {
        self.step("unprovision")?;
        let mut state = self.state.lock().unwrap();
        if state.mode.is_provisioned() {
            state.mode = ControlMode::PreProvisioning;
            Ok(UnprovisionOutcome::Deactivated)
        } else {
            Ok(UnprovisionOutcome::AlreadyUnprovisioned)
        }
    }

    async fn sync_clock(&self, _device: &DeviceId) -> Result<()> {
        self.step("sync_clock")
    }

    async fn set_hostname(&self, _device: &DeviceId, _hostname: &str) -> Result<()> {
        self.step("set_hostname")
    }

    async fn refresh_network_address(&self, _device: &DeviceId) -> Result<()> {
        self.step("refresh_network_address")
    }

    async fn update_admin_password(&self, _device: &DeviceId, _new_password: &str) -> Result<()> {
        self.step("update_admin_password")
    }

    async fn renew_tls_certificate(
        &self,
        _device: &DeviceId,
        _payload: CertificatePayload,
    ) -> Result<()> {
        self.step("renew_tls_certificate")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_types::TransientError;

    #[tokio::test]
    async fn test_unscripted_calls_succeed() {
        let device = ScriptedDeviceClient::new();
        let id = DeviceId::new("D1");
        device.sync_clock(&id).await.unwrap();
        assert_eq!(device.calls(), vec!["sync_clock"]);
    }

    #[tokio::test]
    async fn test_script_consumed_in_order() {
        let device = ScriptedDeviceClient::new();
        let id = DeviceId::new("D1");
        device.script(
            "sync_clock",
            [ScriptStep::Timeout, ScriptStep::Transient("flaky"), ScriptStep::Ok],
        );

        let first = device.sync_clock(&id).await.unwrap_err();
        assert!(matches!(first, DeviceError::Timeout(_)));
        assert!(first.is_transient());

        let second = device.sync_clock(&id).await.unwrap_err();
        assert!(matches!(second, DeviceError::Transient(_)));

        device.sync_clock(&id).await.unwrap();
        assert_eq!(device.call_count("sync_clock"), 3);
    }

    #[tokio::test]
    async fn test_unprovision_is_idempotent() {
        let device = ScriptedDeviceClient::with_control_mode(ControlMode::AdminControl);
        let id = DeviceId::new("D1");

        assert_eq!(
            device.unprovision(&id).await.unwrap(),
            UnprovisionOutcome::Deactivated
        );
        assert_eq!(
            device.unprovision(&id).await.unwrap(),
            UnprovisionOutcome::AlreadyUnprovisioned
        );
    }

    #[tokio::test]
    async fn test_permanent_error_not_transient() {
        let device = ScriptedDeviceClient::new();
        let id = DeviceId::new("D1");
        device.script("configure_cira", [ScriptStep::Permanent("rejected")]);

        let profile_cira = CiraConfig {
            relay_host: "relay.example.com".into(),
            relay_port: 4433,
            trusted_root_cert: "PEM".into(),
        };
        let err = device.configure_cira(&id, &profile_cira).await.unwrap_err();
        assert!(!err.is_transient());
    }
}
