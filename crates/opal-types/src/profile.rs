//! Provisioning profile types
//!
//! A ProvisioningProfile is a named, reusable bundle of network, tunnel,
//! and transport-security settings applied during activation. The engine
//! snapshots the profile once at session start; the snapshot is never
//! mutated mid-session even if the stored profile changes concurrently.

use crate::TenantId;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a named configuration bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningProfile {
    /// Profile name, unique per tenant
    pub name: String,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Control mode the device is activated into
    pub activation: ActivationMode,

    /// TLS mode pushed during ConfigureTransportSecurity
    pub tls_mode: TlsMode,

    /// Generate a random device admin password instead of resolving a
    /// stored one from the secret gateway
    pub random_admin_password: bool,

    /// Domain suffix used to resolve the provisioning credential
    pub domain_suffix: String,

    /// CIRA tunnel parameters; absent when the profile does not call home
    pub cira: Option<CiraConfig>,

    /// Wired network settings
    pub wired: Option<WiredConfig>,

    /// Wireless network settings, applied in order
    pub wireless: Vec<WirelessConfig>,

    /// 802.1x settings
    pub dot1x: Option<Dot1xConfig>,
}

impl ProvisioningProfile {
    /// Minimal profile with only the fields every activation needs.
    pub fn new(
        name: impl Into<String>,
        tenant_id: TenantId,
        domain_suffix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tenant_id,
            activation: ActivationMode::AdminControl,
            tls_mode: TlsMode::ServerAuth,
            random_admin_password: true,
            domain_suffix: domain_suffix.into(),
            cira: None,
            wired: None,
            wireless: Vec::new(),
            dot1x: None,
        }
    }
}

/// Control mode a device is activated into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivationMode {
    /// Full administrative control
    AdminControl,
    /// Client-initiated control with reduced privileges
    ClientControl,
}

/// Transport security mode for the device management interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// TLS disabled
    Disabled,
    /// Server authentication only
    ServerAuth,
    /// Server authentication, non-TLS traffic still allowed
    ServerAuthNonTlsAllowed,
    /// Mutual authentication
    Mutual,
}

/// CIRA tunnel parameters: where the device calls home and whom it trusts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiraConfig {
    /// Management relay the device connects back to
    pub relay_host: String,

    /// Relay port
    pub relay_port: u16,

    /// PEM trust anchor for the relay
    pub trusted_root_cert: String,
}

/// Wired network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WiredConfig {
    /// Use DHCP; static addressing is configured out of band
    pub dhcp: bool,

    /// Whether the wired interface is shared with the host OS
    pub shared_static_ip: bool,

    /// Name of the 802.1x profile applied to the wired interface
    pub dot1x_profile: Option<String>,
}

/// Wireless network settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirelessConfig {
    /// Profile name pushed to the device
    pub profile_name: String,

    /// Network SSID
    pub ssid: String,

    /// Authentication method identifier (for example "WPA2-PSK")
    pub authentication: String,

    /// Secret gateway path holding the passphrase; never inlined here
    pub passphrase_path: String,
}

/// 802.1x settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dot1xConfig {
    /// Profile name pushed to the device
    pub profile_name: String,

    /// EAP protocol identifier (for example "EAP-TLS")
    pub auth_protocol: String,

    /// Secret gateway path holding the CA certificate
    pub ca_cert_path: String,
}
