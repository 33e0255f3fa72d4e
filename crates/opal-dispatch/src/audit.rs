//! Audit event stream
//!
//! Session starts and terminal completions are published onto a broadcast
//! channel. Publication is fire-and-forget: a full or subscriber-less
//! channel never affects workflow execution, and the core never reads the
//! stream back.

use opal_types::{AuditEvent, AuditOutcome};
use tokio::sync::broadcast;
use tracing::debug;

/// Default buffered capacity of the audit channel
pub const DEFAULT_AUDIT_CAPACITY: usize = 256;

/// Broadcast publisher for audit events
#[derive(Clone)]
pub struct AuditSink {
    tx: broadcast::Sender<AuditEvent>,
}

impl AuditSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish one event. Lagging or absent subscribers are ignored.
    pub fn publish(&self, outcome: AuditOutcome, topic: &[&str], message: impl Into<String>) {
        let event = AuditEvent::new(outcome, topic, message);
        debug!(topic = %event.topic_path(), outcome = ?outcome, "Audit event");
        let _ = self.tx.send(event);
    }

    /// Subscribe to events published after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }
}

impl Default for AuditSink {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}
