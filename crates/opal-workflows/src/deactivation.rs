//! Deactivation state machine
//!
//! Releases a device from management:
//! `Start → Unprovision → RevokeSecrets → Done`.
//!
//! Unprovisioning a device that is already out of management is a
//! success, not an error, so operators can re-run deactivation safely.
//! Secret revocation always runs, even on the already-unprovisioned
//! path, so stale material never outlives the device's managed state.

use crate::cancel::CancelSignal;
use crate::failure::WorkflowFailure;
use crate::machine::{ensure_active, WorkflowContext, WorkflowMachine};
use crate::retry::retry_with_backoff;
use async_trait::async_trait;
use opal_device::UnprovisionOutcome;
use opal_types::{DeviceSession, WorkflowKind};
use tracing::{debug, info};

/// Deactivation state machine
pub struct DeactivationMachine;

impl DeactivationMachine {
    pub fn new() -> Self {
        Self
    }

    async fn unprovision(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        session.enter_state("Unprovision");
        ensure_active(cancel)?;

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let outcome = retry_with_backoff(&ctx.retry, cancel, session, "unprovision", move || {
            let device = device.clone();
            let id = id.clone();
            async move { device.unprovision(&id).await }
        })
        .await
        .map_err(|e| e.into_failure("unprovision"))?;

        match outcome {
            UnprovisionOutcome::Deactivated => {
                info!(device = %session.device_id, "Device released from management");
            }
            UnprovisionOutcome::AlreadyUnprovisioned => {
                debug!(device = %session.device_id, "Device was already unprovisioned");
            }
        }
        Ok(())
    }

    async fn revoke_secrets(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        session.enter_state("RevokeSecrets");
        ensure_active(cancel)?;

        // Deletion is idempotent at the gateway; a path that never
        // existed is not an error.
        for path in [
            ctx.paths.device_admin(&session.device_id),
            ctx.paths.device_tls(&session.device_id),
        ] {
            let secrets = ctx.secrets.clone();
            let operation = format!("revoke_secret/{path}");
            retry_with_backoff(&ctx.retry, cancel, session, &operation, move || {
                let secrets = secrets.clone();
                let path = path.clone();
                async move { secrets.delete_secret_at_path(&path).await }
            })
            .await
            .map_err(|e| e.into_failure(&operation))?;
        }
        Ok(())
    }
}

impl Default for DeactivationMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowMachine for DeactivationMachine {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Deactivation
    }

    async fn run(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        self.unprovision(session, ctx, cancel).await?;
        self.revoke_secrets(session, ctx, cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use opal_device::{ControlMode, ScriptStep, ScriptedDeviceClient};
    use opal_secrets::gateway::keys;
    use opal_secrets::{InMemorySecretGateway, SecretGateway, SecretObject, SecretPaths};
    use opal_store::{InMemoryDomainStore, InMemoryProfileStore};
    use opal_types::{DeviceId, TenantId};
    use std::sync::Arc;

    struct Rig {
        secrets: Arc<InMemorySecretGateway>,
        device: Arc<ScriptedDeviceClient>,
        ctx: WorkflowContext,
    }

    fn rig(mode: ControlMode) -> Rig {
        let secrets = Arc::new(InMemorySecretGateway::new());
        let device = Arc::new(ScriptedDeviceClient::with_control_mode(mode));
        let ctx = WorkflowContext::new(
            Arc::new(InMemoryProfileStore::new()),
            Arc::new(InMemoryDomainStore::new()),
            secrets.clone(),
            device.clone(),
            RetryPolicy::fast(),
            SecretPaths::default(),
        );
        Rig {
            secrets,
            device,
            ctx,
        }
    }

    fn session() -> DeviceSession {
        DeviceSession::new(
            DeviceId::new("D1"),
            TenantId::new("t1"),
            WorkflowKind::Deactivation,
            None,
        )
    }

    async fn seed_device_secrets(rig: &Rig) {
        let mut admin = SecretObject::new();
        admin.insert(keys::ADMIN_PASSWORD.to_string(), "Old#Pass12345678".to_string());
        rig.secrets
            .write_secret_with_object("devices/D1/admin", admin)
            .await
            .unwrap();
        let mut tls = SecretObject::new();
        tls.insert(keys::TLS_CERT.to_string(), "MIIB".to_string());
        rig.secrets
            .write_secret_with_object("devices/D1/tls", tls)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_deactivation_unprovisions_and_revokes() {
        let rig = rig(ControlMode::AdminControl);
        seed_device_secrets(&rig).await;

        let machine = DeactivationMachine::new();
        let mut s = session();
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();

        assert_eq!(rig.device.calls(), vec!["unprovision"]);
        assert!(!rig.secrets.contains("devices/D1/admin"));
        assert!(!rig.secrets.contains("devices/D1/tls"));
    }

    #[tokio::test]
    async fn test_already_unprovisioned_is_success() {
        let rig = rig(ControlMode::PreProvisioning);
        seed_device_secrets(&rig).await;

        let machine = DeactivationMachine::new();
        let mut s = session();
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();

        // Revocation still ran
        assert!(!rig.secrets.contains("devices/D1/admin"));
        assert!(!rig.secrets.contains("devices/D1/tls"));
    }

    #[tokio::test]
    async fn test_revocation_of_absent_secrets_is_success() {
        let rig = rig(ControlMode::ClientControl);

        let machine = DeactivationMachine::new();
        let mut s = session();
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_transient_unprovision_failure_is_retried() {
        let rig = rig(ControlMode::AdminControl);
        rig.device
            .script("unprovision", [ScriptStep::Transient("busy")]);

        let machine = DeactivationMachine::new();
        let mut s = session();
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();

        assert_eq!(rig.device.call_count("unprovision"), 2);
        assert_eq!(s.retries_for("unprovision"), 1);
    }

    #[tokio::test]
    async fn test_permanent_unprovision_failure_skips_revocation() {
        let rig = rig(ControlMode::AdminControl);
        seed_device_secrets(&rig).await;
        rig.device
            .script("unprovision", [ScriptStep::Permanent("refused")]);

        let machine = DeactivationMachine::new();
        let mut s = session();
        let failure = machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap_err();

        assert!(failure.message.contains("refused"));
        // Secrets stay behind so the device remains reachable
        assert!(rig.secrets.contains("devices/D1/admin"));
    }

    #[tokio::test]
    async fn test_cancel_before_unprovision() {
        let rig = rig(ControlMode::AdminControl);
        let (handle, signal) = crate::cancel::cancel_pair();
        handle.cancel();

        let machine = DeactivationMachine::new();
        let mut s = session();
        let failure = machine.run(&mut s, &rig.ctx, &signal).await.unwrap_err();

        assert!(failure.is_cancelled());
        assert!(rig.device.calls().is_empty());
    }
}
