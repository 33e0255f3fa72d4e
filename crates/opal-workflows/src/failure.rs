//! Terminal workflow failure

use thiserror::Error;

/// The terminal failure of one workflow.
///
/// Carries the short diagnostic that becomes the completion record's
/// message. Never contains secret material.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct WorkflowFailure {
    /// Human-readable diagnostic
    pub message: String,
}

impl WorkflowFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure produced by a delivered cancel signal
    pub fn cancelled() -> Self {
        Self::new("cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.message == "cancelled"
    }
}
