use super::TaskId;
use crate::operations::aggregator::AggregateId;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use tracing::warn;

/// What the original caller receives once per logical operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub kind: String,
    pub success: bool,
    pub error: Option<String>,
    pub payload: Option<Value>,
}

pub type CompletionCallback = Box<dyn FnOnce(&TaskReport) + Send + 'static>;

/// Where a task reports its terminal state after merging
pub enum Completion {
    /// Invoke the caller's callbacks on the client thread
    Notify(Vec<CompletionCallback>),
    /// Record the terminal state in an aggregator's status table entry
    Aggregate { id: AggregateId, kind: String },
    /// Fire-and-forget; nobody is waiting on the result
    Detached,
}

impl Completion {
    pub fn callback(callback: impl FnOnce(&TaskReport) + Send + 'static) -> Self {
        Self::Notify(vec![Box::new(callback)])
    }

    /// Attach another callback. An `Aggregate` completion reports into its
    /// status table, so the callback is dropped with a warning.
    pub fn and_then(self, callback: impl FnOnce(&TaskReport) + Send + 'static) -> Self {
        match self {
            Self::Notify(mut callbacks) => {
                callbacks.push(Box::new(callback));
                Self::Notify(callbacks)
            }
            Self::Detached => Self::callback(callback),
            Self::Aggregate { id, kind } => {
                warn!(
                    aggregate_id = %id,
                    kind = %kind,
                    "Callback attached to an aggregate entry was dropped"
                );
                Self::Aggregate { id, kind }
            }
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Notify(callbacks) => write!(f, "Notify({} callbacks)", callbacks.len()),
            Self::Aggregate { id, kind } => write!(f, "Aggregate({id}, {kind})"),
            Self::Detached => write!(f, "Detached"),
        }
    }
}
