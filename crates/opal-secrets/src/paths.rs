//! Deterministic secret path layout
//!
//! Every secret the engine touches lives at a path derived from the
//! profile or device it belongs to, so deactivation can revoke
//! device-scoped material without a lookup table.

use opal_types::DeviceId;
use serde::{Deserialize, Serialize};

/// Path layout for the secret gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretPaths {
    /// Prefix for domain provisioning certificates
    pub cert_prefix: String,

    /// Prefix for device-scoped secrets
    pub device_prefix: String,
}

impl Default for SecretPaths {
    fn default() -> Self {
        Self {
            cert_prefix: "certs".to_string(),
            device_prefix: "devices".to_string(),
        }
    }
}

impl SecretPaths {
    /// Path of the provisioning certificate for a domain's profile
    pub fn provisioning_cert(&self, profile_name: &str) -> String {
        format!("{}/{}", self.cert_prefix, profile_name)
    }

    /// Path of a device's admin password
    pub fn device_admin(&self, device_id: &DeviceId) -> String {
        format!("{}/{}/admin", self.device_prefix, device_id)
    }

    /// Path of a device's TLS material
    pub fn device_tls(&self, device_id: &DeviceId) -> String {
        format!("{}/{}/tls", self.device_prefix, device_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_layout() {
        let paths = SecretPaths::default();
        let device = DeviceId::new("D1");
        assert_eq!(paths.provisioning_cert("P1"), "certs/P1");
        assert_eq!(paths.device_admin(&device), "devices/D1/admin");
        assert_eq!(paths.device_tls(&device), "devices/D1/tls");
    }
}
