//! Task dispatcher
//!
//! The dispatcher is the single entry point for workflow execution. A
//! submission either gets rejected synchronously (another workflow holds
//! the device) or is accepted: the caller receives a correlation id plus
//! a one-shot completion channel, and the workflow runs on its own task.
//! Exactly one completion record is produced per accepted request; it is
//! delivered on the channel, kept for later polling, and mirrored onto
//! the audit stream.

use crate::audit::AuditSink;
use crate::error::{DispatchError, Result};
use crate::session_registry::{ActiveSession, SessionRegistry};
use dashmap::DashMap;
use opal_types::{
    AuditOutcome, CompletionRecord, CorrelationId, WorkflowRequest,
};
use opal_workflows::{cancel_pair, create_machine, run_to_completion, CancelHandle, WorkflowContext};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::info;

/// Synchronous result of an accepted submission
#[derive(Debug)]
pub struct SubmitReceipt {
    /// Handle tying this request to its completion record
    pub correlation_id: CorrelationId,

    /// Resolves with the single completion record of the workflow
    pub completion: oneshot::Receiver<CompletionRecord>,
}

/// Accepts workflow requests and runs each on its own task
#[derive(Clone)]
pub struct TaskDispatcher {
    ctx: WorkflowContext,
    registry: SessionRegistry,
    audit: AuditSink,
    cancels: Arc<DashMap<CorrelationId, CancelHandle>>,
    // Records stay here until reclaimed with `take_result`; pollers that
    // never take must bound their own submission volume.
    results: Arc<DashMap<CorrelationId, CompletionRecord>>,
}

impl TaskDispatcher {
    pub fn new(ctx: WorkflowContext, audit: AuditSink) -> Self {
        Self {
            ctx,
            registry: SessionRegistry::new(),
            audit,
            cancels: Arc::new(DashMap::new()),
            results: Arc::new(DashMap::new()),
        }
    }

    /// Submit a workflow request.
    ///
    /// Rejects with `AlreadyInProgress` when the device's session slot is
    /// held; otherwise spawns the workflow and returns its receipt.
    pub fn submit(&self, request: WorkflowRequest) -> Result<SubmitReceipt> {
        let correlation_id = CorrelationId::generate();
        let task = request.workflow_kind.task_name();

        let guard = self
            .registry
            .try_acquire(ActiveSession {
                device_id: request.device_id.clone(),
                tenant_id: request.tenant_id.clone(),
                kind: request.workflow_kind,
                correlation_id,
                started_at: chrono::Utc::now(),
            })
            .ok_or_else(|| DispatchError::AlreadyInProgress {
                tenant: request.tenant_id.clone(),
                device: request.device_id.clone(),
            })?;

        let (cancel_handle, cancel_signal) = cancel_pair();
        self.cancels.insert(correlation_id, cancel_handle);

        info!(
            device = %request.device_id,
            tenant = %request.tenant_id,
            task = task,
            correlation = %correlation_id,
            "Workflow accepted"
        );
        self.audit.publish(
            AuditOutcome::Success,
            &["opal", task, "started"],
            format!("device {}", request.device_id),
        );

        let session = opal_types::DeviceSession::new(
            request.device_id.clone(),
            request.tenant_id.clone(),
            request.workflow_kind,
            request.profile_name.clone(),
        );
        let machine = create_machine(request.workflow_kind, request.parameters);

        let (tx, rx) = oneshot::channel();
        let this = self.clone();
        tokio::spawn(async move {
            let record =
                run_to_completion(machine.as_ref(), session, &this.ctx, &cancel_signal).await;

            this.cancels.remove(&correlation_id);
            // Release the device slot before anyone can observe the
            // record, so a follow-up submission never races a dying
            // session.
            drop(guard);

            let outcome = if record.is_success() {
                AuditOutcome::Success
            } else {
                AuditOutcome::Failure
            };
            this.audit.publish(
                outcome,
                &["opal", task, "completed"],
                format!("device {}: {}", request.device_id, record.message),
            );

            this.results.insert(correlation_id, record.clone());
            let _ = tx.send(record);
        });

        Ok(SubmitReceipt {
            correlation_id,
            completion: rx,
        })
    }

    /// Request cancellation of a running workflow.
    ///
    /// Delivery is cooperative; the workflow still terminates through its
    /// own completion record.
    pub fn cancel(&self, correlation_id: CorrelationId) -> Result<()> {
        match self.cancels.get(&correlation_id) {
            Some(handle) => {
                info!(correlation = %correlation_id, "Cancellation requested");
                handle.cancel();
                Ok(())
            }
            None => Err(DispatchError::UnknownCorrelation(correlation_id)),
        }
    }

    /// Completion record of a finished workflow, if any
    pub fn result(&self, correlation_id: CorrelationId) -> Option<CompletionRecord> {
        self.results
            .get(&correlation_id)
            .map(|entry| entry.value().clone())
    }

    /// Remove and return a finished workflow's completion record.
    ///
    /// This is the reclaiming call: records not taken are retained
    /// indefinitely for later polling.
    pub fn take_result(&self, correlation_id: CorrelationId) -> Option<CompletionRecord> {
        self.results
            .remove(&correlation_id)
            .map(|(_, record)| record)
    }

    /// Snapshot of every running session
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.registry.snapshot()
    }

    /// Subscribe to audit events published from now on
    pub fn subscribe_audit(&self) -> tokio::sync::broadcast::Receiver<opal_types::AuditEvent> {
        self.audit.subscribe()
    }
}
