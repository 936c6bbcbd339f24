use super::events::TaskEvent;
use crate::error::{RelayError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Created on the client thread, not yet picked up by the worker
    #[default]
    NotStarted,
    /// Remote call issued, or a local task waiting on client-side state
    InProgress,
    /// Finished successfully
    Done,
    /// Finished with an error
    Failed,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Apply an event, returning the resulting state
    ///
    /// Legal transitions:
    /// - `NotStarted --Start--> InProgress`
    /// - `NotStarted --Fail--> Failed` (construction failure)
    /// - `InProgress --Complete--> Done`
    /// - `InProgress --Fail--> Failed`
    pub fn apply(&self, event: &TaskEvent) -> Result<TaskState> {
        match (self, event) {
            (Self::NotStarted, TaskEvent::Start) => Ok(Self::InProgress),
            (Self::NotStarted, TaskEvent::Fail(_)) => Ok(Self::Failed),
            (Self::InProgress, TaskEvent::Complete) => Ok(Self::Done),
            (Self::InProgress, TaskEvent::Fail(_)) => Ok(Self::Failed),
            (state, event) => Err(RelayError::StateTransition(format!(
                "cannot apply '{}' to a task in state '{state}'",
                event.event_type()
            ))),
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not_started"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}
