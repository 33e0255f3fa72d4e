//! Per-device session registry
//!
//! Enforces at most one live workflow per (tenant, device). Acquisition
//! is atomic through the map's entry API, so two concurrent submissions
//! for the same device cannot both win. The winner holds a guard whose
//! drop releases the slot; the registry itself keeps only an
//! observational snapshot of the running session.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use opal_types::{CorrelationId, DeviceId, TenantId, WorkflowKind};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

type SessionKey = (TenantId, DeviceId);

/// Observational snapshot of one running workflow
#[derive(Debug, Clone, Serialize)]
pub struct ActiveSession {
    pub device_id: DeviceId,
    pub tenant_id: TenantId,
    pub kind: WorkflowKind,
    pub correlation_id: CorrelationId,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// Registry of live sessions keyed by (tenant, device)
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<DashMap<SessionKey, ActiveSession>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the device slot for a new session.
    ///
    /// Returns `None` when a session already holds the slot. On success
    /// the returned guard owns the slot until dropped.
    pub fn try_acquire(&self, session: ActiveSession) -> Option<SessionGuard> {
        let key = (session.tenant_id.clone(), session.device_id.clone());
        match self.inner.entry(key.clone()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                debug!(
                    device = %session.device_id,
                    tenant = %session.tenant_id,
                    correlation = %session.correlation_id,
                    "Session slot acquired"
                );
                slot.insert(session);
                Some(SessionGuard {
                    inner: self.inner.clone(),
                    key,
                })
            }
        }
    }

    /// Whether a session currently holds the device's slot
    pub fn is_active(&self, tenant: &TenantId, device: &DeviceId) -> bool {
        self.inner
            .contains_key(&(tenant.clone(), device.clone()))
    }

    /// Snapshot of every running session
    pub fn snapshot(&self) -> Vec<ActiveSession> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Exclusive hold on one device's session slot
pub struct SessionGuard {
    inner: Arc<DashMap<SessionKey, ActiveSession>>,
    key: SessionKey,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.remove(&self.key);
        debug!(device = %self.key.1, tenant = %self.key.0, "Session slot released");
    }
}
