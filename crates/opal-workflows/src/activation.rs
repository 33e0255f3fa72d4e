//! Activation state machine
//!
//! Brings one device under management:
//! `Start → ResolveProfile → ResolveDomainCredential → DetermineControlMode
//! → EstablishAdminAccess → ConfigureNetwork → ConfigureTunnel →
//! ConfigureTransportSecurity → Done`.
//!
//! Every state has a failure branch straight to `Done(FAILED)`. Devices
//! already under management by another authority fail closed rather than
//! being silently reconfigured, and any permanent network-configuration
//! failure aborts the whole workflow so a later re-activation starts
//! clean.

use crate::cancel::CancelSignal;
use crate::failure::WorkflowFailure;
use crate::machine::{ensure_active, WorkflowContext, WorkflowMachine};
use crate::password::generate_admin_password;
use crate::retry::retry_with_backoff;
use async_trait::async_trait;
use opal_device::{AclEntry, CertificatePayload, ControlMode};
use opal_secrets::gateway::keys;
use opal_secrets::SecretObject;
use opal_types::{DeviceSession, DomainCredential, ProvisioningProfile, WorkflowKind};
use tracing::{debug, info};

/// Account name of the access-control entry pushed during activation
const ADMIN_ACCOUNT: &str = "admin";

#[derive(Debug, Clone, Copy)]
enum ActivationState {
    ResolveProfile,
    ResolveDomainCredential,
    DetermineControlMode,
    EstablishAdminAccess,
    ConfigureNetwork,
    ConfigureTunnel,
    ConfigureTransportSecurity,
}

impl ActivationState {
    fn as_str(&self) -> &'static str {
        match self {
            ActivationState::ResolveProfile => "ResolveProfile",
            ActivationState::ResolveDomainCredential => "ResolveDomainCredential",
            ActivationState::DetermineControlMode => "DetermineControlMode",
            ActivationState::EstablishAdminAccess => "EstablishAdminAccess",
            ActivationState::ConfigureNetwork => "ConfigureNetwork",
            ActivationState::ConfigureTunnel => "ConfigureTunnel",
            ActivationState::ConfigureTransportSecurity => "ConfigureTransportSecurity",
        }
    }
}

/// Activation state machine
pub struct ActivationMachine;

impl ActivationMachine {
    pub fn new() -> Self {
        Self
    }

    fn enter(
        session: &mut DeviceSession,
        state: ActivationState,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        session.enter_state(state.as_str());
        debug!(device = %session.device_id, state = state.as_str(), "Entering state");
        ensure_active(cancel)
    }

    async fn resolve_profile(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<ProvisioningProfile, WorkflowFailure> {
        Self::enter(session, ActivationState::ResolveProfile, cancel)?;

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

        lookup
            .map_err(|e| e.into_failure("resolve_profile"))?
            .ok_or_else(|| WorkflowFailure::new("profile not found"))
    }

    async fn resolve_domain_credential(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
        profile: &ProvisioningProfile,
    ) -> Result<DomainCredential, WorkflowFailure> {
        Self::enter(session, ActivationState::ResolveDomainCredential, cancel)?;

        let resolver = ctx.resolver.clone();
        let suffix = profile.domain_suffix.clone();
        let tenant = session.tenant_id.clone();
        retry_with_backoff(
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
        .map_err(|e| e.into_failure("resolve_domain_credential"))
    }

    async fn determine_control_mode(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        Self::enter(session, ActivationState::DetermineControlMode, cancel)?;

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let mode: ControlMode =
            retry_with_backoff(&ctx.retry, cancel, session, "control_mode", move || {
            let device = device.clone();
            let id = id.clone();
            async move { device.control_mode(&id).await }
        })
        .await
        .map_err(|e| e.into_failure("control_mode"))?;

        if mode.is_provisioned() {
            // Fail closed: reconfiguring a device another authority owns
            // is worse than refusing.
            return Err(WorkflowFailure::new("already provisioned"));
        }
        Ok(())
    }

    async fn establish_admin_access(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
        profile: &ProvisioningProfile,
    ) -> Result<(), WorkflowFailure> {
        Self::enter(session, ActivationState::EstablishAdminAccess, cancel)?;

        let admin_path = ctx.paths.device_admin(&session.device_id);
        let password = if profile.random_admin_password {
            let password = generate_admin_password();
            // Store the password before pushing it to the device so the
            // credential is never held by the device alone.
            let secrets = ctx.secrets.clone();
            let path = admin_path.clone();
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
            password
        } else {
            let secrets = ctx.secrets.clone();
            let path = admin_path.clone();
            let object = retry_with_backoff(
                &ctx.retry,
                cancel,
                session,
                "fetch_admin_password",
                move || {
                    let secrets = secrets.clone();
                    let path = path.clone();
                    async move { secrets.get_secret_at_path(&path).await }
                },
            )
            .await
            .map_err(|e| e.into_failure("fetch_admin_password"))?;

            object
                .get(keys::ADMIN_PASSWORD)
                .cloned()
                .ok_or_else(|| WorkflowFailure::new("admin password secret is malformed"))?
        };

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        retry_with_backoff(&ctx.retry, cancel, session, "set_admin_acl", move || {
            let device = device.clone();
            let id = id.clone();
            let password = password.clone();
            async move {
                device
                    .set_admin_acl(
                        &id,
                        AclEntry {
                            username: ADMIN_ACCOUNT.to_string(),
                            password,
                        },
                    )
                    .await
            }
        })
        .await
        .map_err(|e| e.into_failure("set_admin_acl"))
    }

    async fn configure_network(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
        profile: &ProvisioningProfile,
    ) -> Result<(), WorkflowFailure> {
        Self::enter(session, ActivationState::ConfigureNetwork, cancel)?;

        if let Some(wired) = &profile.wired {
            let device = ctx.device.clone();
            let id = session.device_id.clone();
            let wired = wired.clone();
            retry_with_backoff(&ctx.retry, cancel, session, "configure_wired", move || {
                let device = device.clone();
                let id = id.clone();
                let wired = wired.clone();
                async move { device.configure_wired(&id, &wired).await }
            })
            .await
            .map_err(|e| e.into_failure("configure_wired"))?;
        }

        for wireless in &profile.wireless {
            let operation = format!("configure_wireless/{}", wireless.profile_name);
            let device = ctx.device.clone();
            let id = session.device_id.clone();
            let wireless = wireless.clone();
            retry_with_backoff(&ctx.retry, cancel, session, &operation, move || {
                let device = device.clone();
                let id = id.clone();
                let wireless = wireless.clone();
                async move { device.configure_wireless(&id, &wireless).await }
            })
            .await
            .map_err(|e| e.into_failure(&operation))?;
        }

        if let Some(dot1x) = &profile.dot1x {
            let device = ctx.device.clone();
            let id = session.device_id.clone();
            let dot1x = dot1x.clone();
            retry_with_backoff(&ctx.retry, cancel, session, "configure_dot1x", move || {
                let device = device.clone();
                let id = id.clone();
                let dot1x = dot1x.clone();
                async move { device.configure_dot1x(&id, &dot1x).await }
            })
            .await
            .map_err(|e| e.into_failure("configure_dot1x"))?;
        }

        Ok(())
    }

    async fn configure_tunnel(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
        profile: &ProvisioningProfile,
    ) -> Result<(), WorkflowFailure> {
        Self::enter(session, ActivationState::ConfigureTunnel, cancel)?;

        let Some(cira) = &profile.cira else {
            debug!(device = %session.device_id, "Profile has no tunnel settings, skipping");
            return Ok(());
        };

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let cira = cira.clone();
        retry_with_backoff(&ctx.retry, cancel, session, "configure_cira", move || {
            let device = device.clone();
            let id = id.clone();
            let cira = cira.clone();
            async move { device.configure_cira(&id, &cira).await }
        })
        .await
        .map_err(|e| e.into_failure("configure_cira"))
    }

    async fn configure_transport_security(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
        profile: &ProvisioningProfile,
        credential: DomainCredential,
    ) -> Result<(), WorkflowFailure> {
        Self::enter(session, ActivationState::ConfigureTransportSecurity, cancel)?;

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let cert = credential.provisioning_cert.clone();
        let cert_password = credential.cert_password.clone();
        retry_with_backoff(
            &ctx.retry,
            cancel,
            session,
            "install_certificate",
            move || {
                let device = device.clone();
                let id = id.clone();
                let payload = CertificatePayload {
                    cert: cert.clone(),
                    password: cert_password.clone(),
                };
                async move { device.install_certificate(&id, payload).await }
            },
        )
        .await
        .map_err(|e| e.into_failure("install_certificate"))?;

        // Record the TLS material so deactivation can revoke it and
        // renewal can find it.
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

        let device = ctx.device.clone();
        let id = session.device_id.clone();
        let tls_mode = profile.tls_mode;
        retry_with_backoff(&ctx.retry, cancel, session, "set_tls_mode", move || {
            let device = device.clone();
            let id = id.clone();
            async move { device.set_tls_mode(&id, tls_mode).await }
        })
        .await
        .map_err(|e| e.into_failure("set_tls_mode"))?;

        info!(
            device = %session.device_id,
            tls_mode = ?profile.tls_mode,
            "Transport security configured"
        );
        Ok(())
    }
}

impl Default for ActivationMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WorkflowMachine for ActivationMachine {
    fn kind(&self) -> WorkflowKind {
        WorkflowKind::Activation
    }

    async fn run(
        &self,
        session: &mut DeviceSession,
        ctx: &WorkflowContext,
        cancel: &CancelSignal,
    ) -> Result<(), WorkflowFailure> {
        let profile = self.resolve_profile(session, ctx, cancel).await?;
        let credential = self
            .resolve_domain_credential(session, ctx, cancel, &profile)
            .await?;
        self.determine_control_mode(session, ctx, cancel).await?;
        self.establish_admin_access(session, ctx, cancel, &profile)
            .await?;
        self.configure_network(session, ctx, cancel, &profile).await?;
        self.configure_tunnel(session, ctx, cancel, &profile).await?;
        self.configure_transport_security(session, ctx, cancel, &profile, credential)
            .await?;
        Ok(())
    }
}
