//! Secret gateway trait

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Key/value object stored at one secret path
pub type SecretObject = HashMap<String, String>;

/// Gateway to the secret store.
///
/// Deletes are idempotent: removing an absent path succeeds. Reads fail
/// distinctly for "not found" vs "unavailable".
#[async_trait]
pub trait SecretGateway: Send + Sync {
    /// Fetch the object stored at `path`
    async fn get_secret_at_path(&self, path: &str) -> Result<SecretObject>;

    /// Store `object` at `path`, replacing any previous object
    async fn write_secret_with_object(&self, path: &str, object: SecretObject) -> Result<()>;

    /// Remove the object at `path`; absent paths are not an error
    async fn delete_secret_at_path(&self, path: &str) -> Result<()>;
}

/// Well-known keys inside secret objects
pub mod keys {
    /// Provisioning certificate, base64 PFX
    pub const PROVISIONING_CERT: &str = "PROVISIONING_CERT";
    /// Password protecting the provisioning certificate
    pub const PROVISIONING_CERT_PASSWORD: &str = "PROVISIONING_CERT_PASSWORD";
    /// Device admin password
    pub const ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
    /// Device TLS certificate
    pub const TLS_CERT: &str = "TLS_CERT";
}
