//! OPAL Workflows - the per-device provisioning state machines
//!
//! Each workflow runs as one sequential actor over a `DeviceSession`:
//! states execute strictly in order, suspension points are exactly the
//! external calls, and the machine terminates with exactly one
//! `CompletionRecord`. Transient collaborator failures are retried in
//! place with bounded exponential backoff; everything else converts
//! immediately to a terminal failure.
//!
//! The three machine families (activation, deactivation, maintenance)
//! share the retry, cancellation, and completion plumbing instead of
//! duplicating it.

#![deny(unsafe_code)]

pub mod activation;
pub mod cancel;
pub mod deactivation;
pub mod failure;
pub mod machine;
pub mod maintenance;
pub mod password;
pub mod retry;

pub use activation::ActivationMachine;
pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use deactivation::DeactivationMachine;
pub use failure::WorkflowFailure;
pub use machine::{create_machine, run_to_completion, WorkflowContext, WorkflowMachine};
pub use maintenance::MaintenanceMachine;
pub use retry::{retry_with_backoff, RetryError, RetryPolicy};
