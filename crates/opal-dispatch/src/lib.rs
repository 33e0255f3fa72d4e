//! OPAL Dispatch - workflow admission and execution
//!
//! Owns everything around the state machines: the per-device session
//! registry, the task dispatcher that spawns one task per accepted
//! request, cooperative cancellation, the audit broadcast stream, and
//! process configuration.

#![deny(unsafe_code)]

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod session_registry;

pub use audit::AuditSink;
pub use config::{init_logging, LoggingConfig, ProvisionerConfig};
pub use dispatcher::{SubmitReceipt, TaskDispatcher};
pub use error::DispatchError;
pub use session_registry::{ActiveSession, SessionGuard, SessionRegistry};
