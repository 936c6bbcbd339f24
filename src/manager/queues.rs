use super::stats::AtomicManagerStats;
use crate::task::Task;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// Tasks waiting for the worker to pick them up
#[derive(Debug, Default)]
pub(crate) struct SubmissionQueues {
    /// Strict FIFO, executed one at a time
    pub serial: VecDeque<Task>,
    /// Started all at once on the next worker pass
    pub parallel: Vec<Task>,
    pub shutdown: bool,
}

impl SubmissionQueues {
    pub fn is_empty(&self) -> bool {
        self.serial.is_empty() && self.parallel.is_empty()
    }
}

/// FIFO hand-off from the worker thread to the client thread
#[derive(Debug, Default)]
pub(crate) struct OutputQueue {
    tasks: Mutex<Vec<Task>>,
    available: Condvar,
}

impl OutputQueue {
    pub fn push(&self, task: Task) {
        self.tasks.lock().push(task);
        self.available.notify_all();
    }

    /// Swap out everything completed so far; the lock is held only for the swap
    pub fn drain(&self) -> Vec<Task> {
        std::mem::take(&mut *self.tasks.lock())
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Park until at least one task is available or `timeout` elapses
    pub fn wait_nonempty(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut tasks = self.tasks.lock();
        while tasks.is_empty() {
            if self.available.wait_until(&mut tasks, deadline).timed_out() {
                return !tasks.is_empty();
            }
        }
        true
    }
}

/// State shared between the manager handle and its worker thread
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub queues: Mutex<SubmissionQueues>,
    pub output: OutputQueue,
    pub work_available: Notify,
    pub stats: AtomicManagerStats,
}
