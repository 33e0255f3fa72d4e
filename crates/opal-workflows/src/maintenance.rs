//! Maintenance state machines
//!
//! Every maintenance task shares one short shape:
//! `Start → Validate → Apply → Done`. Validate confirms the device is
//! under management (and under admin control where the task needs it)
//! and that required parameters are present; Apply issues the task's
//! protocol calls. Tasks are single purpose, so a failed Apply leaves
//! nothing half-configured beyond its own operation.

use crate::cancel::CancelSignal;
use crate::failure::WorkflowFailure;
use crate::machine::{ensure_active, WorkflowContext, WorkflowMachine};
use crate::password::generate_admin_password;
use crate::retry::retry_with_backoff;
use async_trait::async_trait;
use opal_device::{CertificatePayload, ControlMode};
use opal_secrets::gateway::keys;
use opal_secrets::SecretObject;
use opal_types::{DeviceSession, MaintenanceKind, WorkflowKind};
use std::collections::HashMap;
use tracing::info;

/// Parameter carrying the desired hostname for a hostname sync
pub const PARAM_HOSTNAME: &str = "hostname";

/// Maintenance state machine, specialized by task kind
pub struct MaintenanceMachine {
    task: MaintenanceKind,
    parameters: HashMap<String, String>,
}

impl MaintenanceMachine {
    pub fn new(task: MaintenanceKind, parameters: HashMap<String, String>) -> Self {
        Self { task, parameters }
    }

    /// Whether the task needs the stronger admin control mode
    fn requires_admin_control(&self) -> bool {
        matches!(
            self.task,
            MaintenanceKind::RotateAdminPassword | MaintenanceKind::RenewTlsCertificate
        )
    }

    async fn validate(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        session.enter_state("Validate");
        ensure_active(cancel)?;

        if self.task == MaintenanceKind::SyncHostname
            && !self.parameters.contains_key(PARAM_HOSTNAME)
        {
            return Err(WorkflowFailure::new("hostname parameter is required"));
        }
        if self.task == MaintenanceKind::RenewTlsCertificate && session.profile_name.is_none() {
            return Err(WorkflowFailure::new("profile not found"));
        }

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let mode = retry_with_backoff(&ctx.retry, cancel, session, "control_mode", move || {
            let device = device.clone();
            let id = id.clone();
            async move { device.control_mode(&id).await }
        })
        .await
        .map_err(|e| e.into_failure("control_mode"))?;

        if !mode.is_provisioned() {
            return Err(WorkflowFailure::new("device not provisioned"));
        }
        if self.requires_admin_control() && mode != ControlMode::AdminControl {
            return Err(WorkflowFailure::new("device not under admin control"));
        }
        Ok(())
    }

    async fn apply(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        session.enter_state("Apply");
        ensure_active(cancel)?;

        match self.task {
            MaintenanceKind::SyncClock => {
                let device = ctx.device.clone();
                let id = session.device_id.clone();
                retry_with_backoff(&ctx.retry, cancel, session, "sync_clock", move || {
                    let device = device.clone();
                    let id = id.clone();
                    async move { device.sync_clock(&id).await }
                })
                .await
                .map_err(|e| e.into_failure("sync_clock"))
            }

            MaintenanceKind::SyncHostname => {
                // Presence checked in Validate
                let hostname = self
                    .parameters
                    .get(PARAM_HOSTNAME)
                    .cloned()
                    .ok_or_else(|| WorkflowFailure::new("hostname parameter is required"))?;
                let device = ctx.device.clone();
                let id = session.device_id.clone();
                retry_with_backoff(&ctx.retry, cancel, session, "set_hostname", move || {
                    let device = device.clone();
                    let id = id.clone();
                    let hostname = hostname.clone();
                    async move { device.set_hostname(&id, &hostname).await }
                })
                .await
                .map_err(|e| e.into_failure("set_hostname"))
            }

            MaintenanceKind::SyncNetworkAddress => {
                let device = ctx.device.clone();
                let id = session.device_id.clone();
                retry_with_backoff(
                    &ctx.retry,
                    cancel,
                    session,
                    "refresh_network_address",
                    move || {
                        let device = device.clone();
                        let id = id.clone();
                        async move { device.refresh_network_address(&id).await }
                    },
                )
                .await
                .map_err(|e| e.into_failure("refresh_network_address"))
            }

            MaintenanceKind::RotateAdminPassword => {
                self.rotate_admin_password(session, ctx, cancel).await
            }

            MaintenanceKind::RenewTlsCertificate => {
                self.renew_tls_certificate(session, ctx, cancel).await
            }
        }
    }

    async fn rotate_admin_password(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        let password = generate_admin_password();

        // Store first so the new credential is never held by the device
        // alone.
        let secrets = ctx.secrets.clone();
        let path = ctx.paths.device_admin(&session.device_id);
        let stored = password.clone();
        retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "store_admin_password",
            move || {
                let secrets = secrets.clone();
                let path = path.clone();
                let stored = stored.clone();
                async move {
                    let mut object = SecretObject::new();
                    object.insert(keys::ADMIN_PASSWORD.to_string(), stored);
                    secrets.write_secret_with_object(&path, object).await
                }
            },
        )
        .await
        .map_err(|e| e.into_failure("store_admin_password"))?;

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "update_admin_password",
            move || {
                let device = device.clone();
                let id = id.clone();
                let password = password.clone();
                async move { device.update_admin_password(&id, &password).await }
            },
        )
        .await
        .map_err(|e| e.into_failure("update_admin_password"))?;

        info!(device = %session.device_id, "Admin password rotated");
        Ok(())
    }

    async fn renew_tls_certificate(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        // Presence checked in Validate
        let name = session
            .profile_name
            .clone()
            .ok_or_else(|| WorkflowFailure::new("profile not found"))?;

        let profiles = ctx.profiles.clone();
        let tenant = session.tenant_id.clone();
        let lookup = {
            let name = name.clone();
            retry_with_backoff(&ctx.retry, cancel, session, "resolve_profile", move || {
                let profiles = profiles.clone();
                let tenant = tenant.clone();
                let name = name.clone();
                async move { profiles.get_profile_by_name(&name, &tenant).await }
            })
            .await
        };
        let profile = lookup
            .map_err(|e| e.into_failure("resolve_profile"))?
            .ok_or_else(|| WorkflowFailure::new("profile not found"))?;

        let resolver = ctx.resolver.clone();
        let suffix = profile.domain_suffix.clone();
        let tenant = session.tenant_id.clone();
        let credential = retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "resolve_domain_credential",
            move || {
                let resolver = resolver.clone();
                let suffix = suffix.clone();
                let tenant = tenant.clone();
                async move { resolver.resolve(&suffix, &tenant).await }
            },
        )
        .await
        .map_err(|e| e.into_failure("resolve_domain_credential"))?;

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let cert = credential.provisioning_cert.clone();
        let cert_password = credential.cert_password.clone();
        retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "renew_tls_certificate",
            move || {
                let device = device.clone();
                let id = id.clone();
                let payload = CertificatePayload {
                    cert: cert.clone(),
                    password: cert_password.clone(),
                };
                async move { device.renew_tls_certificate(&id, payload).await }
            },
        )
        .await
        .map_err(|e| e.into_failure("renew_tls_certificate"))?;

        let secrets = ctx.secrets.clone();
        let tls_path = ctx.paths.device_tls(&session.device_id);
        let cert = credential.provisioning_cert.clone();
        retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "store_tls_material",
            move || {
                let secrets = secrets.clone();
                let tls_path = tls_path.clone();
                let cert = cert.clone();
                async move {
                    let mut object = SecretObject::new();
                    object.insert(keys::TLS_CERT.to_string(), cert);
                    secrets.write_secret_with_object(&tls_path, object).await
                }
            },
        )
        .await
        .map_err(|e| e.into_failure("store_tls_material"))?;

        info!(device = %session.device_id, "TLS certificate renewed");
        Ok(())
    }
}

#[async_trait]
impl WorkflowMachine for MaintenanceMachine {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Maintenance(self.task)
    }

    async fn run(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        self.validate(session, ctx, cancel).await?;
        self.apply(session, ctx, cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryPolicy;
    use opal_device::{ScriptStep, ScriptedDeviceClient};
    use opal_secrets::{InMemorySecretGateway, SecretGateway, SecretPaths};
    use opal_store::{InMemoryDomainStore, InMemoryProfileStore};
    use opal_types::{
        DeviceId, DomainRecord, ProvisioningProfile, SecretReference, TenantId,
    };
    use std::sync::Arc;

    struct Rig {
        profiles: Arc<InMemoryProfileStore>,
        domains: Arc<InMemoryDomainStore>,
        secrets: Arc<InMemorySecretGateway>,
        device: Arc<ScriptedDeviceClient>,
        ctx: WorkflowContext,
    }

    fn rig(mode: ControlMode) -> Rig {
        let profiles = Arc::new(InMemoryProfileStore::new());
        let domains = Arc::new(InMemoryDomainStore::new());
        let secrets = Arc::new(InMemorySecretGateway::new());
        let device = Arc::new(ScriptedDeviceClient::with_control_mode(mode));
        let ctx = WorkflowContext::new(
            profiles.clone(),
            domains.clone(),
            secrets.clone(),
            device.clone(),
            RetryPolicy::fast(),
            SecretPaths::default(),
        );
        Rig {
            profiles,
            domains,
            secrets,
            device,
            ctx,
        }
    }

    fn tenant() -> TenantId {
        TenantId::new("t1")
    }

    fn session(task: MaintenanceKind, profile: Option<&str>) -> DeviceSession {
        DeviceSession::new(
            DeviceId::new("D1"),
            tenant(),
            WorkflowKind::Maintenance(task),
            profile.map(String::from),
        )
    }

    fn no_params() -> HashMap<String, String> {
        HashMap::new()
    }

    #[tokio::test]
    async fn test_sync_clock() {
        let rig = rig(ControlMode::ClientControl);
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncClock, no_params());
        let mut s = session(MaintenanceKind::SyncClock, None);
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();
        assert_eq!(rig.device.calls(), vec!["control_mode", "sync_clock"]);
    }

    #[tokio::test]
    async fn test_sync_clock_rejects_unprovisioned_device() {
        let rig = rig(ControlMode::PreProvisioning);
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncClock, no_params());
        let mut s = session(MaintenanceKind::SyncClock, None);
        let failure = machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap_err();
        assert_eq!(failure.message, "device not provisioned");
        assert_eq!(rig.device.calls(), vec!["control_mode"]);
    }

    #[tokio::test]
    async fn test_sync_hostname_requires_parameter() {
        let rig = rig(ControlMode::AdminControl);
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncHostname, no_params());
        let mut s = session(MaintenanceKind::SyncHostname, None);
        let failure = machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap_err();
        assert_eq!(failure.message, "hostname parameter is required");
        assert!(rig.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_sync_hostname_applies_parameter() {
        let rig = rig(ControlMode::AdminControl);
        let mut params = HashMap::new();
        params.insert(PARAM_HOSTNAME.to_string(), "edge-07".to_string());
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncHostname, params);
        let mut s = session(MaintenanceKind::SyncHostname, None);
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();
        assert_eq!(rig.device.calls(), vec!["control_mode", "set_hostname"]);
    }

    #[tokio::test]
    async fn test_sync_network_address_retries_transient() {
        let rig = rig(ControlMode::ClientControl);
        rig.device
            .script("refresh_network_address", [ScriptStep::Transient("busy")]);
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncNetworkAddress, no_params());
        let mut s = session(MaintenanceKind::SyncNetworkAddress, None);
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();
        assert_eq!(rig.device.call_count("refresh_network_address"), 2);
    }

    #[tokio::test]
    async fn test_rotate_password_stores_before_pushing() {
        let rig = rig(ControlMode::AdminControl);
        let machine = MaintenanceMachine::new(MaintenanceKind::RotateAdminPassword, no_params());
        let mut s = session(MaintenanceKind::RotateAdminPassword, None);
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();
        assert!(rig.secrets.contains("devices/D1/admin"));
        assert_eq!(rig.device.call_count("update_admin_password"), 1);
    }

    #[tokio::test]
    async fn test_rotate_password_requires_admin_control() {
        let rig = rig(ControlMode::ClientControl);
        let machine = MaintenanceMachine::new(MaintenanceKind::RotateAdminPassword, no_params());
        let mut s = session(MaintenanceKind::RotateAdminPassword, None);
        let failure = machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap_err();
        assert_eq!(failure.message, "device not under admin control");
        assert!(!rig.secrets.contains("devices/D1/admin"));
    }

    #[tokio::test]
    async fn test_renew_tls_certificate() {
        let rig = rig(ControlMode::AdminControl);
        rig.profiles.insert(ProvisioningProfile::new(
            "P1",
            tenant(),
            "corp.example.com",
        ));
        rig.domains.insert(DomainRecord {
            profile_name: "P1".into(),
            domain_suffix: "corp.example.com".into(),
            tenant_id: tenant(),
            cert_secret: SecretReference::new("certs/P1"),
        });
        let mut cert = SecretObject::new();
        cert.insert(keys::PROVISIONING_CERT.to_string(), "MIIB".to_string());
        cert.insert(
            keys::PROVISIONING_CERT_PASSWORD.to_string(),
            "pfx-pass".to_string(),
        );
        rig.secrets
            .write_secret_with_object("certs/P1", cert)
            .await
            .unwrap();

        let machine = MaintenanceMachine::new(MaintenanceKind::RenewTlsCertificate, no_params());
        let mut s = session(MaintenanceKind::RenewTlsCertificate, Some("P1"));
        machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap();

        assert_eq!(
            rig.device.calls(),
            vec!["control_mode", "renew_tls_certificate"]
        );
        assert!(rig.secrets.contains("devices/D1/tls"));
    }

    #[tokio::test]
    async fn test_renew_tls_without_profile_fails_in_validate() {
        let rig = rig(ControlMode::AdminControl);
        let machine = MaintenanceMachine::new(MaintenanceKind::RenewTlsCertificate, no_params());
        let mut s = session(MaintenanceKind::RenewTlsCertificate, None);
        let failure = machine
            .run(&mut s, &rig.ctx, &CancelSignal::none())
            .await
            .unwrap_err();
        assert_eq!(failure.message, "profile not found");
        assert!(rig.device.calls().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_between_validate_and_apply_stops_the_task() {
        let rig = rig(ControlMode::AdminControl);
        let (handle, signal) = crate::cancel::cancel_pair();
        handle.cancel();
        let machine = MaintenanceMachine::new(MaintenanceKind::SyncClock, no_params());
        let mut s = session(MaintenanceKind::SyncClock, None);
        let failure = machine.run(&mut s, &rig.ctx, &signal).await.unwrap_err();
        assert!(failure.is_cancelled());
        assert!(rig.device.calls().is_empty());
    }
}
