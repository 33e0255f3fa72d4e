//! In-memory secret gateway
//!
//! Development and test backend. Holds objects in a concurrent map and can
//! simulate an unreachable gateway.

use crate::error::{Result, SecretError};
use crate::gateway::{SecretGateway, SecretObject};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// In-memory secret gateway
pub struct InMemorySecretGateway {
    objects: DashMap<String, SecretObject>,
    unavailable: AtomicBool,
    /// When non-zero, the next N reads fail Unavailable then recover
    fail_reads: AtomicU32,
}

impl InMemorySecretGateway {
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            unavailable: AtomicBool::new(false),
            fail_reads: AtomicU32::new(0),
        }
    }

    /// Simulate a persistently unreachable gateway
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Fail the next `n` reads with Unavailable, then recover
    pub fn fail_next_reads(&self, n: u32) {
        self.fail_reads.store(n, Ordering::SeqCst);
    }

    /// Whether any object exists at `path`
    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretError::Unavailable("gateway offline".into()));
        }
        Ok(())
    }
}

impl Default for InMemorySecretGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretGateway for InMemorySecretGateway {
    async fn get_secret_at_path(&self, path: &str) -> Result<SecretObject> {
        self.check_available()?;
        if self
            .fail_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(SecretError::Unavailable("gateway flaking".into()));
        }
        self.objects
            .get(path)
            .map(|o| o.clone())
            .ok_or_else(|| SecretError::NotFound(path.to_string()))
    }

    async fn write_secret_with_object(&self, path: &str, object: SecretObject) -> Result<()> {
        self.check_available()?;
        self.objects.insert(path.to_string(), object);
        Ok(())
    }

    async fn delete_secret_at_path(&self, path: &str) -> Result<()> {
        self.check_available()?;
        self.objects.remove(path);
        Ok(())
    }
}
