//! OPAL Store - profile and domain persistence seams
//!
//! The profile/domain store is an external collaborator with a fixed
//! interface: lookups return `Ok(None)` for "missing" and only fail for
//! infrastructure problems. In-memory backends are provided for
//! development and testing; production deployments plug in a persistent
//! implementation of the same traits.

#![deny(unsafe_code)]

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryDomainStore, InMemoryProfileStore};
pub use store::{DomainStore, ProfileStore};
