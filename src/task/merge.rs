use super::{Completion, DispatchMode, Operation, Task, TaskId};
use crate::client::ClientState;
use crate::config::RelayConfig;
use crate::operations::subscription;
use crate::service::ServiceContext;
use std::sync::Arc;
use tracing::debug;

/// Client-thread view handed to [`Operation::merge`].
///
/// Tasks submitted through this context are buffered and handed to the
/// manager after the current tick has processed its whole drained list, so
/// they become visible no earlier than the following tick.
pub struct MergeContext<'a> {
    client: &'a mut ClientState,
    service: &'a Arc<ServiceContext>,
    pending: &'a mut Vec<Task>,
    completion: &'a mut Option<Completion>,
    mode: DispatchMode,
    task_id: TaskId,
}

impl<'a> MergeContext<'a> {
    pub(crate) fn new(
        client: &'a mut ClientState,
        service: &'a Arc<ServiceContext>,
        pending: &'a mut Vec<Task>,
        completion: &'a mut Option<Completion>,
        mode: DispatchMode,
        task_id: TaskId,
    ) -> Self {
        Self {
            client,
            service,
            pending,
            completion,
            mode,
            task_id,
        }
    }

    pub fn client(&self) -> &ClientState {
        &*self.client
    }

    pub fn client_mut(&mut self) -> &mut ClientState {
        &mut *self.client
    }

    pub fn service(&self) -> &Arc<ServiceContext> {
        self.service
    }

    pub fn config(&self) -> &RelayConfig {
        self.service.config()
    }

    /// Dispatch mode of the task being merged
    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Identifier of the task being merged
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Queue a new task for submission at the end of this tick
    pub fn submit(
        &mut self,
        operation: Box<dyn Operation>,
        mode: DispatchMode,
        completion: Completion,
    ) -> TaskId {
        let task = Task::new(Arc::clone(self.service), operation, mode, completion);
        let task_id = task.id();
        debug!(
            parent = %self.task_id,
            task_id = %task_id,
            kind = %task.kind(),
            mode = %mode,
            "Queued follow-up task from merge"
        );
        self.pending.push(task);
        task_id
    }

    /// Take over the current task's completion.
    ///
    /// Once taken, the current task reports nothing; whoever holds the
    /// completion reports on its behalf.
    pub fn take_completion(&mut self) -> Option<Completion> {
        self.completion.take()
    }

    /// Resubmit a continuation of the current task to the same dispatch mode.
    /// The continuation inherits the completion, so the chain reports once.
    pub fn continue_with(&mut self, operation: Box<dyn Operation>) -> TaskId {
        let completion = self.take_completion().unwrap_or(Completion::Detached);
        let mode = self.mode;
        self.submit(operation, mode, completion)
    }

    /// Subscribe to push updates for subjects not yet in the dedup cache.
    /// Returns the number of subscribe requests queued.
    pub fn subscribe<I, S>(&mut self, subjects: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        subscription::subscribe_new(self.client, self.service, self.pending, subjects)
    }
}
