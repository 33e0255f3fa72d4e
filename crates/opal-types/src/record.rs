//! Completion records
//!
//! Exactly one CompletionRecord is produced per accepted request, at the
//! moment the state machine reaches its terminal state. It is the sole
//! contract surfaced to callers and to the audit bus.

use crate::WorkflowKind;
use serde::{Deserialize, Serialize};

/// Terminal success/failure artifact for one workflow invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    /// Task name ("activation", "deactivation", or the maintenance task name)
    pub task_name: String,

    /// Terminal status
    pub status: CompletionStatus,

    /// Short human-readable diagnostic; empty on success. Never contains
    /// secret material.
    pub message: String,
}

/// Terminal status values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompletionStatus {
    Success,
    Failed,
}

impl CompletionRecord {
    /// Successful completion with an empty message
    pub fn success(kind: WorkflowKind) -> Self {
        Self {
            task_name: kind.task_name().to_string(),
            status: CompletionStatus::Success,
            message: String::new(),
        }
    }

    /// Failed completion with a diagnostic
    pub fn failed(kind: WorkflowKind, message: impl Into<String>) -> Self {
        Self {
            task_name: kind.task_name().to_string(),
            status: CompletionStatus::Failed,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == CompletionStatus::Success
    }
}
