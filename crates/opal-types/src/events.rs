//! Audit event types
//!
//! Audit events are derived 1:1 from significant transitions (session
//! start, terminal state) and published onto the audit stream. They are
//! purely observational; the core never reads them back.

use serde::{Deserialize, Serialize};

/// Outcome carried by an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Observational record of a significant transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Outcome of whatever the event describes
    pub outcome: AuditOutcome,

    /// Hierarchical topic path (for example ["opal", "activation", "started"])
    pub topic: Vec<String>,

    /// Free-text message; never contains secret material
    pub message: String,

    /// Publication timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl AuditEvent {
    pub fn new(outcome: AuditOutcome, topic: &[&str], message: impl Into<String>) -> Self {
        Self {
            outcome,
            topic: topic.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Topic path joined with '/'
    pub fn topic_path(&self) -> String {
        self.topic.join("/")
    }
}
