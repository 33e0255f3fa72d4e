//! OPAL Types - Core types for out-of-band device provisioning
//!
//! OPAL (Out-of-band Provisioning and Lifecycle) remotely activates,
//! deactivates, and maintains out-of-band management endpoints by driving
//! a vendor management protocol through authenticated configuration steps.
//!
//! ## Architectural Boundaries
//!
//! - **opal-dispatch** owns: workflow admission, per-device mutual exclusion,
//!   audit emission
//! - **opal-workflows** owns: the per-session state machines, retry/backoff
//! - **opal-store / opal-secrets / opal-device** own: the collaborator seams
//!   (profile persistence, secret material, the device protocol)
//!
//! ## Key Concepts
//!
//! - **ProvisioningProfile**: immutable snapshot of a named configuration bundle
//! - **DomainCredential**: certificate/password pair proving provisioning authority
//! - **DeviceSession**: ephemeral record of one running workflow
//! - **CompletionRecord**: the single terminal artifact per accepted request
//! - **AuditEvent**: observational record of significant transitions

#![deny(unsafe_code)]

pub mod domain;
pub mod events;
pub mod ids;
pub mod profile;
pub mod record;
pub mod request;
pub mod session;

pub use domain::{DomainCredential, DomainRecord, SecretReference};
pub use events::{AuditEvent, AuditOutcome};
pub use ids::{CorrelationId, DeviceId, TenantId};
pub use profile::{
    ActivationMode, CiraConfig, Dot1xConfig, ProvisioningProfile, TlsMode, WiredConfig,
    WirelessConfig,
};
pub use record::{CompletionRecord, CompletionStatus};
pub use request::WorkflowRequest;
pub use session::{DeviceSession, MaintenanceKind, WorkflowKind};

/// Classification seam for retryable errors.
///
/// Collaborator error types implement this so the shared retry loop can
/// distinguish transient failures (which consume retry budget) from
/// permanent ones (which fail the workflow immediately).
pub trait TransientError {
    /// True when a retry of the same call could reasonably succeed.
    fn is_transient(&self) -> bool;
}
