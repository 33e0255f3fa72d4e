//! Store traits consumed by the provisioning core

use crate::error::Result;
use async_trait::async_trait;
use opal_types::{DomainRecord, ProvisioningProfile, TenantId};

/// Persistence seam for provisioning profiles, keyed by tenant + name
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch a profile by name; `Ok(None)` when no such profile exists
    async fn get_profile_by_name(
        &self,
        name: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ProvisioningProfile>>;
}

/// Persistence seam for domain rows, keyed by tenant + suffix
#[async_trait]
pub trait DomainStore: Send + Sync {
    /// First domain row whose suffix matches; `Ok(None)` when none does
    async fn get_domain_by_suffix(
        &self,
        suffix: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<DomainRecord>>;
}
