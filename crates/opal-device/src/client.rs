//! Device protocol client trait and payload types

use crate::error::Result;
use async_trait::async_trait;
use opal_types::{CiraConfig, DeviceId, Dot1xConfig, TlsMode, WiredConfig, WirelessConfig};
use serde::{Deserialize, Serialize};

/// Control mode reported by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlMode {
    /// Factory state, not under management
    PreProvisioning,
    /// Under client-initiated control
    ClientControl,
    /// Under full administrative control
    AdminControl,
}

impl ControlMode {
    /// True when the device is under management in any mode
    pub fn is_provisioned(&self) -> bool {
        !matches!(self, ControlMode::PreProvisioning)
    }
}

/// Access-control entry pushed during activation
#[derive(Clone, Serialize, Deserialize)]
pub struct AclEntry {
    /// Account name
    pub username: String,
    /// Account password
    pub password: String,
}

impl std::fmt::Debug for AclEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AclEntry")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Certificate material pushed to a device
#[derive(Clone, Serialize, Deserialize)]
pub struct CertificatePayload {
    /// Certificate, base64 PFX
    pub cert: String,
    /// Password protecting the certificate
    pub password: String,
}

impl std::fmt::Debug for CertificatePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificatePayload")
            .field("cert", &"<redacted>")
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Outcome of an unprovision call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnprovisionOutcome {
    /// The device was under management and has been returned to factory state
    Deactivated,
    /// The device was already unmanaged; nothing to do
    AlreadyUnprovisioned,
}

/// Device management protocol client.
///
/// One operation per protocol action. Implementations own per-call
/// deadlines and surface breaches as `DeviceError::Timeout`.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Query the device's current control mode
    async fn control_mode(&self, device: &DeviceId) -> Result<ControlMode>;

    /// Push an access-control entry
    async fn set_admin_acl(&self, device: &DeviceId, entry: AclEntry) -> Result<()>;

    /// Apply wired network settings
    async fn configure_wired(&self, device: &DeviceId, settings: &WiredConfig) -> Result<()>;

    /// Apply one wireless profile
    async fn configure_wireless(&self, device: &DeviceId, settings: &WirelessConfig)
        -> Result<()>;

    /// Apply 802.1x settings
    async fn configure_dot1x(&self, device: &DeviceId, settings: &Dot1xConfig) -> Result<()>;

    /// Push CIRA tunnel parameters so the device can call home
    async fn configure_cira(&self, device: &DeviceId, settings: &CiraConfig) -> Result<()>;

    /// Install certificate material
    async fn install_certificate(
        &self,
        device: &DeviceId,
        payload: CertificatePayload,
    ) -> Result<()>;

    /// Set the transport security mode
    async fn set_tls_mode(&self, device: &DeviceId, mode: TlsMode) -> Result<()>;

    /// Return the device to factory/unmanaged state
    async fn unprovision(&self, device: &DeviceId) -> Result<UnprovisionOutcome>;

    /// Synchronize the device clock to the management plane
    async fn sync_clock(&self, device: &DeviceId) -> Result<()>;

    /// Set the device hostname
    async fn set_hostname(&self, device: &DeviceId, hostname: &str) -> Result<()>;

    /// Refresh the device network address
    async fn refresh_network_address(&self, device: &DeviceId) -> Result<()>;

    /// Replace the device admin password
    async fn update_admin_password(&self, device: &DeviceId, new_password: &str) -> Result<()>;

    /// Replace the device TLS certificate
    async fn renew_tls_certificate(
        &self,
        device: &DeviceId,
        payload: CertificatePayload,
    ) -> Result<()>;
}
