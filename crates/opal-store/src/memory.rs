//! In-memory implementations of the store traits
//!
//! Suitable for development and testing. Production deployments should
//! use persistent backends.

use crate::error::{Result, StoreError};
use crate::store::{DomainStore, ProfileStore};
use async_trait::async_trait;
use dashmap::DashMap;
use opal_types::{DomainRecord, ProvisioningProfile, TenantId};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory profile store
pub struct InMemoryProfileStore {
    profiles: DashMap<(TenantId, String), ProvisioningProfile>,
    unavailable: AtomicBool,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self {
            profiles: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Seed a profile
    pub fn insert(&self, profile: ProvisioningProfile) {
        self.profiles
            .insert((profile.tenant_id.clone(), profile.name.clone()), profile);
    }

    /// Simulate infrastructure failure for tests
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for InMemoryProfileStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile_by_name(
        &self,
        name: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ProvisioningProfile>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("profile store offline".into()));
        }
        Ok(self
            .profiles
            .get(&(tenant_id.clone(), name.to_string()))
            .map(|p| p.clone()))
    }
}

/// In-memory domain store
pub struct InMemoryDomainStore {
    domains: DashMap<TenantId, Vec<DomainRecord>>,
    unavailable: AtomicBool,
}

impl InMemoryDomainStore {
    pub fn new() -> Self {
        Self {
            domains: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Seed a domain row; rows are matched in insertion order
    pub fn insert(&self, record: DomainRecord) {
        self.domains
            .entry(record.tenant_id.clone())
            .or_default()
            .push(record);
    }

    /// Simulate infrastructure failure for tests
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl Default for InMemoryDomainStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainStore for InMemoryDomainStore {
    async fn get_domain_by_suffix(
        &self,
        suffix: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<DomainRecord>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("domain store offline".into()));
        }
        if let Some(rows) = self.domains.get(tenant_id) {
            for row in rows.iter() {
                if row.domain_suffix.eq_ignore_ascii_case(suffix) {
                    return Ok(Some(row.clone()));
                }
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_types::SecretReference;

    fn domain_row(suffix: &str) -> DomainRecord {
        DomainRecord {
            profile_name: "P1".into(),
            domain_suffix: suffix.into(),
            tenant_id: TenantId::new("t1"),
            cert_secret: SecretReference::new(format!("certs/{}", suffix)),
        }
    }

    #[tokio::test]
    async fn test_profile_missing_is_none() {
        let store = InMemoryProfileStore::new();
        let found = store
            .get_profile_by_name("nope", &TenantId::new("t1"))
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_profile_round_trip() {
        let store = InMemoryProfileStore::new();
        store.insert(ProvisioningProfile::new(
            "P1",
            TenantId::new("t1"),
            "corp.example.com",
        ));

        let found = store
            .get_profile_by_name("P1", &TenantId::new("t1"))
            .await
            .unwrap();
        assert_eq!(found.unwrap().domain_suffix, "corp.example.com");

        // Same name under another tenant is a different key
        let other = store
            .get_profile_by_name("P1", &TenantId::new("t2"))
            .await
            .unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn test_domain_first_match_wins() {
        let store = InMemoryDomainStore::new();
        let mut first = domain_row("corp.example.com");
        first.profile_name = "first".into();
        let mut second = domain_row("corp.example.com");
        second.profile_name = "second".into();
        store.insert(first);
        store.insert(second);

        let found = store
            .get_domain_by_suffix("corp.example.com", &TenantId::new("t1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.profile_name, "first");
    }

    #[tokio::test]
    async fn test_domain_suffix_match_is_case_insensitive() {
        let store = InMemoryDomainStore::new();
        store.insert(domain_row("Corp.Example.Com"));

        let found = store
            .get_domain_by_suffix("corp.example.com", &TenantId::new("t1"))
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_unavailable_store_errors() {
        let store = InMemoryProfileStore::new();
        store.set_unavailable(true);
        let result = store.get_profile_by_name("P1", &TenantId::new("t1")).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
    }
}
