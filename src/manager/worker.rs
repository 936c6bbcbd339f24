use super::queues::Shared;
use crate::state_machine::TaskState;
use crate::task::Task;
use std::sync::Arc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info};

/// Dispatch loop running on the dedicated worker thread.
///
/// Serial tasks run one at a time in submission order; parallel tasks start
/// as soon as they are seen and run concurrently on the worker's runtime.
pub(crate) struct Worker {
    shared: Arc<Shared>,
}

impl Worker {
    pub fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub async fn run(self) {
        let mut serial: JoinSet<Task> = JoinSet::new();
        let mut parallel: JoinSet<Task> = JoinSet::new();

        info!("Task worker started");

        loop {
            let shutting_down = {
                let mut queues = self.shared.queues.lock();

                if serial.is_empty() {
                    if let Some(task) = queues.serial.pop_front() {
                        debug!(task_id = %task.id(), kind = %task.kind(), "Starting serial task");
                        serial.spawn(task.execute());
                        self.shared
                            .stats
                            .record_started(serial.len(), parallel.len());
                    }
                }

                for task in queues.parallel.drain(..) {
                    debug!(task_id = %task.id(), kind = %task.kind(), "Starting parallel task");
                    parallel.spawn(task.execute());
                    self.shared
                        .stats
                        .record_started(serial.len(), parallel.len());
                }

                queues.shutdown && queues.is_empty()
            };

            if shutting_down && serial.is_empty() && parallel.is_empty() {
                break;
            }

            tokio::select! {
                _ = self.shared.work_available.notified() => {}
                Some(joined) = serial.join_next(), if !serial.is_empty() => self.complete(joined),
                Some(joined) = parallel.join_next(), if !parallel.is_empty() => self.complete(joined),
            }
        }

        info!("Task worker stopped");
    }

    fn complete(&self, joined: Result<Task, JoinError>) {
        match joined {
            Ok(task) => {
                self.shared
                    .stats
                    .record_finished(task.state() == TaskState::Failed);
                debug!(
                    task_id = %task.id(),
                    kind = %task.kind(),
                    state = %task.state(),
                    mode = %task.mode(),
                    "Task left the worker"
                );
                self.shared.output.push(task);
            }
            Err(err) => {
                // Panics are caught inside Task::execute, so this is a cancellation
                self.shared.stats.record_lost();
                error!(error = %err, "Worker lost a task future");
            }
        }
    }
}
