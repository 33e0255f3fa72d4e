//! OPAL Secrets - secret gateway seam and domain credential resolution
//!
//! The secret gateway stores and retrieves password and certificate
//! material by path. Plaintext never travels through the persistence
//! layer; the provisioning core fetches it per session and drops it with
//! the session.

#![deny(unsafe_code)]

pub mod error;
pub mod gateway;
pub mod memory;
pub mod paths;
pub mod resolver;

pub use error::{Result, SecretError};
pub use gateway::{SecretGateway, SecretObject};
pub use memory::InMemorySecretGateway;
pub use paths::SecretPaths;
pub use resolver::{DomainCredentialResolver, ResolveError};
