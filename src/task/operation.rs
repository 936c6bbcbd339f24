use super::merge::MergeContext;
use crate::client::ClientState;
use crate::error::Result;
use crate::service::{RemoteRequest, RemoteResponse, ServiceContext};
use crate::state_machine::TaskState;
use serde::Serialize;
use serde_json::Value;

/// Terminal outcome handed to [`Operation::merge`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskOutcome {
    pub state: TaskState,
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.state == TaskState::Done
    }
}

/// Task-specific behavior plugged into the generic [`Task`](super::Task) lifecycle.
///
/// `construct` and `process` run on the worker thread. `poll` and `merge` run
/// on the client thread, and `merge` is the only hook that receives mutable
/// access to client-owned state.
pub trait Operation: Send + 'static {
    /// Short name used for logging and completion reports
    fn kind(&self) -> &str;

    /// Build the remote request.
    ///
    /// `Err` fails the task without any remote call. `Ok(None)` marks a local
    /// task that issues no remote call; its terminal state is decided later
    /// by [`Operation::poll`].
    fn construct(&mut self, context: &ServiceContext) -> Result<Option<RemoteRequest>>;

    /// Interpret the remote response and keep whatever the merge step needs
    fn process(&mut self, response: RemoteResponse) -> Result<()> {
        let _ = response;
        Ok(())
    }

    /// Decide the terminal state of a local task.
    ///
    /// `None` withholds the task; it is polled again on the next tick.
    fn poll(&mut self, client: &ClientState) -> Option<Result<()>> {
        let _ = client;
        Some(Ok(()))
    }

    /// Copy results into client state and return the payload reported to
    /// this task's completion.
    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value>;
}
