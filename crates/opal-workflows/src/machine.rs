//! Workflow skeleton
//!
//! A `WorkflowMachine` drives one `DeviceSession` from Start to a terminal
//! state. The driver owns the session for its whole life and produces
//! exactly one `CompletionRecord` when the machine returns; the session is
//! dropped on that terminal transition.

use crate::activation::ActivationMachine;
use crate::cancel::CancelSignal;
use crate::deactivation::DeactivationMachine;
use crate::failure::WorkflowFailure;
use crate::maintenance::MaintenanceMachine;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use opal_device::DeviceClient;
use opal_secrets::{DomainCredentialResolver, SecretGateway, SecretPaths};
use opal_store::{DomainStore, ProfileStore};
use opal_types::{CompletionRecord, DeviceSession, WorkflowKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Collaborators and policy threaded into every state machine.
///
/// Built once at startup from explicit configuration; nothing here is
/// ambient global state.
#[derive(Clone)]
pub struct WorkflowContext {
    /// Profile persistence seam
    pub profiles: Arc<dyn ProfileStore>,

    /// Secret gateway
    pub secrets: Arc<dyn SecretGateway>,

    /// Device protocol client
    pub device: Arc<dyn DeviceClient>,

    /// Credential resolver over the domain store and `secrets`
    pub resolver: Arc<DomainCredentialResolver>,

    /// Shared per-operation retry policy
    pub retry: RetryPolicy,

    /// Secret path layout
    pub paths: SecretPaths,
}

impl WorkflowContext {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        domains: Arc<dyn DomainStore>,
        secrets: Arc<dyn SecretGateway>,
        device: Arc<dyn DeviceClient>,
        retry: RetryPolicy,
        paths: SecretPaths,
    ) -> Self {
        let resolver = Arc::new(DomainCredentialResolver::new(
            domains,
            secrets.clone(),
            paths.clone(),
        ));
        Self {
            profiles,
            secrets,
            device,
            resolver,
            retry,
            paths,
        }
    }
}

/// One workflow state machine
#[async_trait]
pub trait WorkflowMachine: Send + Sync {
    /// Workflow kind this machine implements
    fn kind(&self) -> WorkflowKind;

    /// Drive the session to a terminal state. `Ok(())` maps to
    /// `Done(SUCCESS)`, `Err` to `Done(FAILED, message)`.
    async fn run(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure>;
}

/// Instantiate the machine matching a workflow kind
pub fn create_machine(
    kind: WorkflowKind,
    parameters: HashMap<String, String>,
) -> Box<dyn WorkflowMachine> {
    match kind {
        WorkflowKind::Activation => Box::new(ActivationMachine::new()),
        WorkflowKind::Deactivation => Box::new(DeactivationMachine::new()),
        WorkflowKind::Maintenance(task) => Box::new(MaintenanceMachine::new(task, parameters)),
    }
}

/// Run a machine over a fresh session and produce its completion record.
///
/// The session is consumed: terminal transition destroys it.
pub async fn run_to_completion(
    machine: &dyn WorkflowMachine,
    mut session: DeviceSession,
    ctx: &WorkflowContext,
    cancel: &CancelSignal,
) -> CompletionRecord {
    let kind = machine.kind();
    info!(
        device = %session.device_id,
        tenant = %session.tenant_id,
        task = kind.task_name(),
        "Workflow started"
    );

    match machine.run(&mut session, ctx, cancel).await {
        Ok(()) => {
            info!(
                device = %session.device_id,
                task = kind.task_name(),
                "Workflow completed"
            );
            CompletionRecord::success(kind)
        }
        Err(failure) => {
            warn!(
                device = %session.device_id,
                task = kind.task_name(),
                state = %session.current_state,
                reason = %failure.message,
                "Workflow failed"
            );
            CompletionRecord::failed(kind, failure.message)
        }
    }
}

/// Fail the workflow with `cancelled` when the signal has fired.
///
/// Checked on every state boundary so a cancelled session issues no
/// further collaborator calls.
pub(crate) fn ensure_active(cancel: &CancelSignal) -> Result<(), WorkflowFailure> {
    if cancel.is_cancelled() {
        Err(WorkflowFailure::cancelled())
    } else {
        Ok(())
    }
}
