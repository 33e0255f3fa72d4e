//! Domain records and provisioning credentials
//!
//! A domain row maps a device's domain suffix to the secret gateway path
//! holding the provisioning certificate for that domain. The resolved
//! DomainCredential lives only for the duration of one session; credentials
//! may be rotated between workflows, so nothing caches them.

use crate::TenantId;
use serde::{Deserialize, Serialize};

/// Opaque path into the secret gateway.
///
/// Displays and serializes as the path only; the resolved value never
/// travels with the reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretReference(String);

impl SecretReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SecretReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stored domain row, keyed by tenant + suffix
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainRecord {
    /// Profile name the certificate secret path is derived from
    pub profile_name: String,

    /// Domain suffix this row matches (for example "corp.example.com")
    pub domain_suffix: String,

    /// Owning tenant
    pub tenant_id: TenantId,

    /// Where the provisioning certificate material lives
    pub cert_secret: SecretReference,
}

/// Provisioning certificate and password for one domain, resolved per session
#[derive(Clone)]
pub struct DomainCredential {
    /// Domain suffix the credential proves authority over
    pub domain_suffix: String,

    /// Provisioning certificate, base64 PFX
    pub provisioning_cert: String,

    /// Password protecting the certificate
    pub cert_password: String,
}

// Hand-written so the certificate and password never land in logs.
impl std::fmt::Debug for DomainCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainCredential")
            .field("domain_suffix", &self.domain_suffix)
            .field("provisioning_cert", &"<redacted>")
            .field("cert_password", &"<redacted>")
            .finish()
    }
}
