//! # Task Manager
//!
//! Owns the serial queue, the parallel set and the output queue, and runs the
//! dedicated worker thread that services them.
//!
//! ```text
//! client thread                 worker thread (current-thread tokio runtime)
//! ─────────────                 ──────────────────────────────────────────
//! submit(task) ──→ serial queue ──→ one in flight ──┐
//!              └─→ parallel set ──→ all in flight ──┼──→ output queue
//! drain_completed() ←───────────────────────────────┘
//! ```
//!
//! A task is owned by exactly one of these collections at a time: submitting
//! moves it in, the worker moves it out to execute it, and draining moves it
//! to the client.

mod queues;
mod stats;
mod worker;

pub use stats::ManagerStats;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::task::{DispatchMode, Task, TaskId};
use queues::Shared;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};
use worker::Worker;

pub struct TaskManager {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    thread_name: String,
}

impl TaskManager {
    /// Start the worker thread
    pub fn start(config: &RelayConfig) -> Result<Self> {
        config.validate()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| RelayError::Worker(format!("failed to build worker runtime: {e}")))?;

        let shared = Arc::new(Shared::default());
        let worker = Worker::new(Arc::clone(&shared));
        let thread_name = config.worker_thread_name.clone();

        let handle = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || runtime.block_on(worker.run()))
            .map_err(|e| RelayError::Worker(format!("failed to spawn worker thread: {e}")))?;

        info!(thread = %thread_name, "Task manager started");

        Ok(Self {
            shared,
            worker: Some(handle),
            thread_name,
        })
    }

    /// Hand a task to the worker. Ownership moves into the serial queue or
    /// the parallel set according to the task's dispatch mode.
    pub fn submit(&self, task: Task) -> Result<TaskId> {
        self.offer(task).map_err(|task| {
            RelayError::Worker(format!(
                "task manager is shut down; rejected task {}",
                task.id()
            ))
        })
    }

    /// Same as [`TaskManager::submit`], but a rejected task is handed back
    pub(crate) fn offer(&self, task: Task) -> std::result::Result<TaskId, Task> {
        let task_id = task.id();
        let mode = task.mode();
        {
            let mut queues = self.shared.queues.lock();
            if queues.shutdown {
                return Err(task);
            }
            match mode {
                DispatchMode::Serial => queues.serial.push_back(task),
                DispatchMode::Parallel => queues.parallel.push(task),
            }
        }

        self.shared
            .stats
            .record_submitted(mode == DispatchMode::Serial);
        self.shared.work_available.notify_one();
        debug!(task_id = %task_id, mode = %mode, "Task submitted");
        Ok(task_id)
    }

    /// Swap out every task completed since the last drain, in completion order
    pub fn drain_completed(&self) -> Vec<Task> {
        self.shared.output.drain()
    }

    /// Park the calling thread until output is available or `timeout` elapses.
    /// Intended for hosts without a frame loop; a client tick never calls it.
    pub fn wait_for_output(&self, timeout: Duration) -> bool {
        self.shared.output.wait_nonempty(timeout)
    }

    pub fn pending_output(&self) -> usize {
        self.shared.output.len()
    }

    pub fn stats(&self) -> ManagerStats {
        self.shared.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Stop intake, let the worker finish everything already submitted and
    /// join its thread. Calling it again is a no-op.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };

        self.shared.queues.lock().shutdown = true;
        self.shared.work_available.notify_one();

        handle
            .join()
            .map_err(|_| RelayError::Worker(format!("worker thread '{}' panicked", self.thread_name)))?;

        let undelivered = self.shared.output.len();
        if undelivered > 0 {
            warn!(
                undelivered = undelivered,
                "Completed tasks left undelivered at shutdown"
            );
        }
        info!(thread = %self.thread_name, "Task manager stopped");
        Ok(())
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(error = %err, "Task manager shutdown failed during drop");
        }
    }
}
