//! Domain credential resolution
//!
//! Given a device's domain suffix and tenant, assemble the provisioning
//! certificate and its password from the domain table plus the secret
//! gateway. The credential is resolved per session and never cached:
//! credentials may be rotated between workflows.

use crate::error::SecretError;
use crate::gateway::{keys, SecretGateway};
use crate::paths::SecretPaths;
use async_trait::async_trait;
use opal_store::{DomainStore, StoreError};
use opal_types::{DomainCredential, TenantId, TransientError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument};

/// Resolution error type.
///
/// `DomainNotFound` is a configuration error and never retried;
/// `SecretUnavailable` and `StoreUnavailable` may be transient.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No domain row matches the suffix for the tenant
    #[error("domain not found: {suffix}")]
    DomainNotFound { suffix: String },

    /// The secret gateway could not serve the fetch
    #[error("secret unavailable: {0}")]
    SecretUnavailable(String),

    /// The stored secret object is missing a required key
    #[error("provisioning secret at {path} is malformed: missing {key}")]
    MalformedSecret { path: String, key: &'static str },

    /// The domain store could not serve the lookup
    #[error(transparent)]
    StoreUnavailable(#[from] StoreError),
}

impl TransientError for ResolveError {
    fn is_transient(&self) -> bool {
        match self {
            ResolveError::SecretUnavailable(_) => true,
            ResolveError::StoreUnavailable(e) => e.is_transient(),
            ResolveError::DomainNotFound { .. } | ResolveError::MalformedSecret { .. } => false,
        }
    }
}

/// Resolves provisioning credentials from the domain table and the
/// secret gateway
pub struct DomainCredentialResolver {
    domains: Arc<dyn DomainStore>,
    secrets: Arc<dyn SecretGateway>,
    paths: SecretPaths,
}

impl DomainCredentialResolver {
    pub fn new(
        domains: Arc<dyn DomainStore>,
        secrets: Arc<dyn SecretGateway>,
        paths: SecretPaths,
    ) -> Self {
        Self {
            domains,
            secrets,
            paths,
        }
    }

    /// Resolve the provisioning credential for a domain suffix.
    #[instrument(skip(self), fields(suffix = %suffix, tenant = %tenant_id))]
    pub async fn resolve(
        &self,
        suffix: &str,
        tenant_id: &TenantId,
    ) -> Result<DomainCredential, ResolveError> {
        let domain = self
            .domains
            .get_domain_by_suffix(suffix, tenant_id)
            .await?
            .ok_or_else(|| ResolveError::DomainNotFound {
                suffix: suffix.to_string(),
            })?;

        let path = self.paths.provisioning_cert(&domain.profile_name);
        debug!(path = %path, "Fetching provisioning certificate");

        let object = match self.secrets.get_secret_at_path(&path).await {
            Ok(object) => object,
            // A missing certificate secret for a configured domain is a
            // configuration gap, not a transient outage.
            Err(SecretError::NotFound(path)) => {
                return Err(ResolveError::MalformedSecret {
                    path,
                    key: keys::PROVISIONING_CERT,
                })
            }
            Err(SecretError::Unavailable(reason)) => {
                return Err(ResolveError::SecretUnavailable(reason))
            }
        };

        let cert = object
            .get(keys::PROVISIONING_CERT)
            .ok_or(ResolveError::MalformedSecret {
                path: path.clone(),
                key: keys::PROVISIONING_CERT,
            })?
            .clone();
        let password = object
            .get(keys::PROVISIONING_CERT_PASSWORD)
            .ok_or(ResolveError::MalformedSecret {
                path: path.clone(),
                key: keys::PROVISIONING_CERT_PASSWORD,
            })?
            .clone();

        Ok(DomainCredential {
            domain_suffix: domain.domain_suffix,
            provisioning_cert: cert,
            cert_password: password,
        })
    }
}

/// Convenience seam so workflows can take the resolver behind a trait
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(
        &self,
        suffix: &str,
        tenant_id: &TenantId,
    ) -> Result<DomainCredential, ResolveError>;
}

#[async_trait]
impl CredentialResolver for DomainCredentialResolver {
    async fn resolve(
        &self,
        suffix: &str,
        tenant_id: &TenantId,
    ) -> Result<DomainCredential, ResolveError> {
        DomainCredentialResolver::resolve(self, suffix, tenant_id).await
    }
}
