use super::completion::{Completion, TaskReport};
use super::merge::MergeContext;
use super::operation::{Operation, TaskOutcome};
use crate::client::ClientState;
use crate::error::RelayError;
use crate::logging::{log_task_failure, log_task_operation};
use crate::service::ServiceContext;
use crate::state_machine::{TaskEvent, TaskState};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Which execution collection a task is submitted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Strict FIFO, at most one in flight
    Serial,
    /// Unbounded concurrency, no ordering guarantee
    Parallel,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Parallel => write!(f, "parallel"),
        }
    }
}

/// How a task left the client tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalized {
    /// Caller callbacks were invoked
    Notified,
    /// Terminal state was written into an aggregator table
    Recorded,
    /// Nobody was waiting on the result
    Detached,
    /// The completion moved to a successor (continuation or aggregator)
    HandedOff,
}

/// A unit of remote work.
///
/// Ownership moves from the submitting code to the manager's serial queue or
/// parallel set, then to the worker, then to the output queue and finally to
/// the client tick, which consumes it in [`Task::finalize`].
pub struct Task {
    id: TaskId,
    kind: String,
    state: TaskState,
    error_message: Option<String>,
    mode: DispatchMode,
    local: bool,
    context: Arc<ServiceContext>,
    operation: Box<dyn Operation>,
    completion: Option<Completion>,
    submitted_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        context: Arc<ServiceContext>,
        operation: Box<dyn Operation>,
        mode: DispatchMode,
        completion: Completion,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: operation.kind().to_string(),
            state: TaskState::NotStarted,
            error_message: None,
            mode,
            local: false,
            context,
            operation,
            completion: Some(completion),
            submitted_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn with_callback(
        context: Arc<ServiceContext>,
        operation: impl Operation,
        mode: DispatchMode,
        callback: impl FnOnce(&TaskReport) + Send + 'static,
    ) -> Self {
        Self::new(
            context,
            Box::new(operation),
            mode,
            Completion::callback(callback),
        )
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// True when the task issued no remote call
    pub fn is_local(&self) -> bool {
        self.local
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    fn transition(&mut self, event: TaskEvent) {
        match self.state.apply(&event) {
            Ok(next) => {
                if let Some(message) = event.error_message() {
                    self.error_message = Some(message.to_string());
                }
                self.state = next;
                if next.is_terminal() {
                    self.completed_at = Some(Utc::now());
                }
                log_task_operation(
                    event.event_type(),
                    self.id,
                    &self.kind,
                    &next.to_string(),
                    event.error_message(),
                );
            }
            Err(err) => {
                error!(task_id = %self.id, kind = %self.kind, error = %err, "Rejected task transition");
            }
        }
    }

    fn fail(&mut self, message: String) {
        log_task_failure("fail", self.id, &self.kind, &message);
        self.transition(TaskEvent::Fail(message));
    }

    /// Worker thread: run construction, the remote call and processing.
    ///
    /// Every error and panic is converted into `Failed` here so nothing
    /// escapes into the worker's dispatch loop.
    pub(crate) async fn execute(mut self) -> Self {
        let outcome = AssertUnwindSafe(self.run_remote_phase())
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = format!("task panicked: {}", panic_message(panic.as_ref()));
            self.fail(message);
        }
        self
    }

    async fn run_remote_phase(&mut self) {
        let request = match self.operation.construct(&self.context) {
            Ok(request) => request,
            Err(err) => {
                self.fail(err.to_string());
                return;
            }
        };

        self.transition(TaskEvent::Start);

        let Some(request) = request else {
            self.local = true;
            return;
        };

        let service = Arc::clone(self.context.service());
        debug!(task_id = %self.id, operation = %request.operation, "Issuing remote call");

        match service.call(request).await {
            Ok(response) => match self.operation.process(response) {
                Ok(()) => self.transition(TaskEvent::Complete),
                Err(err) => self.fail(err.to_string()),
            },
            Err(fault) => self.fail(RelayError::from(fault).to_string()),
        }
    }

    /// Client thread: whether the task may be merged now.
    ///
    /// Remote tasks arrive terminal. Local tasks stay `InProgress` until
    /// their operation reports a verdict.
    pub(crate) fn poll_ready(&mut self, client: &ClientState) -> bool {
        if self.state.is_terminal() {
            return true;
        }

        if !(self.local && self.state.is_active()) {
            self.fail(format!(
                "task reached the client in non-terminal state '{}'",
                self.state
            ));
            return true;
        }

        let verdict = std::panic::catch_unwind(AssertUnwindSafe(|| self.operation.poll(client)))
            .unwrap_or_else(|panic| {
                Some(Err(RelayError::Processing(format!(
                    "poll panicked: {}",
                    panic_message(panic.as_ref())
                ))))
            });

        match verdict {
            None => false,
            Some(Ok(())) => {
                self.transition(TaskEvent::Complete);
                true
            }
            Some(Err(err)) => {
                self.fail(err.to_string());
                true
            }
        }
    }

    /// Client thread: merge, then notify. Consumes the task, so it can never
    /// be merged or notified twice.
    ///
    /// Panics from `merge` or a caller's callback are contained: a panicking
    /// merge reports the task as failed, and a panicking callback does not
    /// stop the remaining callbacks.
    pub(crate) fn finalize(mut self, client: &mut ClientState, pending: &mut Vec<Task>) -> Finalized {
        let mut outcome = TaskOutcome {
            state: self.state,
            error: self.error_message.clone(),
        };

        let merged = {
            let mut ctx = MergeContext::new(
                client,
                &self.context,
                pending,
                &mut self.completion,
                self.mode,
                self.id,
            );
            let operation = &mut self.operation;
            let outcome = &outcome;
            std::panic::catch_unwind(AssertUnwindSafe(move || operation.merge(outcome, &mut ctx)))
        };

        let payload = match merged {
            Ok(payload) => payload,
            Err(panic) => {
                let message = format!("merge panicked: {}", panic_message(panic.as_ref()));
                log_task_failure("merge", self.id, &self.kind, &message);
                self.state = TaskState::Failed;
                self.error_message = Some(message.clone());
                outcome = TaskOutcome {
                    state: TaskState::Failed,
                    error: Some(message),
                };
                None
            }
        };

        let finalized = match self.completion.take() {
            Some(Completion::Notify(callbacks)) => {
                let report = TaskReport {
                    task_id: self.id,
                    kind: self.kind.clone(),
                    success: outcome.is_success(),
                    error: outcome.error.clone(),
                    payload,
                };
                for callback in callbacks {
                    if let Err(panic) =
                        std::panic::catch_unwind(AssertUnwindSafe(|| callback(&report)))
                    {
                        error!(
                            task_id = %self.id,
                            kind = %self.kind,
                            panic = %panic_message(panic.as_ref()),
                            "Completion callback panicked"
                        );
                    }
                }
                Finalized::Notified
            }
            Some(Completion::Aggregate { id, kind }) => {
                client.record_aggregate_entry(id, &kind, outcome.state, outcome.error.clone(), payload);
                Finalized::Recorded
            }
            Some(Completion::Detached) => Finalized::Detached,
            None => Finalized::HandedOff,
        };

        debug!(
            task_id = %self.id,
            kind = %self.kind,
            state = %self.state,
            finalized = ?finalized,
            elapsed_ms = (Utc::now() - self.submitted_at).num_milliseconds(),
            "Task finalized"
        );
        finalized
    }
}

impl Task {
    /// Client thread: fail a task the manager would not accept and finalize
    /// it in place, so its caller or aggregate entry still hears back once.
    pub(crate) fn reject(mut self, reason: &str, client: &mut ClientState, pending: &mut Vec<Task>) -> Finalized {
        let message = format!("task rejected: {reason}");
        if self.state.is_terminal() {
            self.state = TaskState::Failed;
            self.error_message = Some(message);
        } else {
            self.fail(message);
        }
        self.finalize(client, pending)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("mode", &self.mode)
            .field("local", &self.local)
            .field("error_message", &self.error_message)
            .field("completion", &self.completion)
            .finish_non_exhaustive()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
