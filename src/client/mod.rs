//! # Client
//!
//! The client-thread half of the orchestrator. [`Client::tick`] is meant to
//! be called once per frame or loop iteration and never blocks: it swaps out
//! the output queue, merges and notifies every ready task in completion
//! order, re-checks withheld aggregators, and finally hands follow-up tasks
//! created during merge to the manager. A follow-up the manager refuses is
//! finalized as failed so its caller or aggregate entry still hears back.

mod state;

pub use state::ClientState;

use crate::config::RelayConfig;
use crate::error::Result;
use crate::manager::{ManagerStats, TaskManager};
use crate::operations::subscription;
use crate::service::{RemoteService, ServiceContext};
use crate::task::{Completion, DispatchMode, Finalized, Operation, Task, TaskId, TaskReport};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one client tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub tick: u64,
    /// Tasks swapped out of the output queue this tick
    pub drained: usize,
    /// Tasks merged (and notified or recorded) this tick
    pub merged: usize,
    /// Caller notifications fired this tick
    pub notified: usize,
    /// Local tasks still waiting on client state after this tick
    pub withheld: usize,
    /// Follow-up tasks handed to the manager at the end of this tick
    pub submitted: usize,
}

pub struct Client {
    context: Arc<ServiceContext>,
    manager: TaskManager,
    state: ClientState,
    withheld: Vec<Task>,
    pending: Vec<Task>,
    ticks: u64,
}

impl Client {
    /// Create the service context and start the worker thread
    pub fn new(config: RelayConfig, service: Arc<dyn RemoteService>) -> Result<Self> {
        config.validate()?;
        let manager = TaskManager::start(&config)?;
        let context = ServiceContext::new(service, config);

        info!(context_id = %context.id(), "Relay client started");

        Ok(Self {
            context,
            manager,
            state: ClientState::default(),
            withheld: Vec::new(),
            pending: Vec::new(),
            ticks: 0,
        })
    }

    pub fn context(&self) -> &Arc<ServiceContext> {
        &self.context
    }

    pub fn config(&self) -> &RelayConfig {
        self.context.config()
    }

    pub fn manager(&self) -> &TaskManager {
        &self.manager
    }

    pub fn state(&self) -> &ClientState {
        &self.state
    }

    /// Local tasks currently withheld from merge
    pub fn withheld(&self) -> usize {
        self.withheld.len()
    }

    /// Submit an operation whose completion invokes `callback` on this thread
    pub fn submit<O: Operation>(
        &mut self,
        operation: O,
        mode: DispatchMode,
        callback: impl FnOnce(&TaskReport) + Send + 'static,
    ) -> Result<TaskId> {
        let task = Task::with_callback(Arc::clone(&self.context), operation, mode, callback);
        self.manager.submit(task)
    }

    /// Submit an operation nobody waits on
    pub fn submit_detached<O: Operation>(&mut self, operation: O, mode: DispatchMode) -> Result<TaskId> {
        let task = Task::new(
            Arc::clone(&self.context),
            Box::new(operation),
            mode,
            Completion::Detached,
        );
        self.manager.submit(task)
    }

    /// Submit a fully constructed task
    pub fn submit_task(&mut self, task: Task) -> Result<TaskId> {
        self.manager.submit(task)
    }

    /// Subscribe to push updates for subjects not yet in the dedup cache.
    /// Returns the number of subscribe requests issued.
    pub fn subscribe<I, S>(&mut self, subjects: I) -> Result<usize>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut queued = Vec::new();
        let issued =
            subscription::subscribe_new(&mut self.state, &self.context, &mut queued, subjects);
        for task in queued {
            self.manager.submit(task)?;
        }
        Ok(issued)
    }

    /// Platform resume hook: push subscriptions were invalidated, so forget them
    pub fn on_resume(&mut self) -> usize {
        let cleared = self.state.subscriptions_mut().reset();
        info!(cleared = cleared, "Subscription cache reset on resume");
        cleared
    }

    pub fn tick(&mut self) -> Result<TickReport> {
        self.ticks += 1;
        let drained = self.manager.drain_completed();
        let mut report = TickReport {
            tick: self.ticks,
            drained: drained.len(),
            ..TickReport::default()
        };

        for task in drained {
            self.process(task, &mut report);
        }

        // Withheld tasks are re-checked after the drained list so sub-tasks
        // merged this tick are already visible to their aggregator
        for task in std::mem::take(&mut self.withheld) {
            self.process(task, &mut report);
        }
        report.withheld = self.withheld.len();

        let follow_ups = std::mem::take(&mut self.pending);
        for task in follow_ups {
            match self.manager.offer(task) {
                Ok(_) => report.submitted += 1,
                Err(task) => self.reject(task, &mut report),
            }
        }

        if report.drained > 0 || report.submitted > 0 {
            debug!(
                tick = report.tick,
                drained = report.drained,
                merged = report.merged,
                notified = report.notified,
                withheld = report.withheld,
                submitted = report.submitted,
                "Client tick"
            );
        }
        Ok(report)
    }

    fn process(&mut self, mut task: Task, report: &mut TickReport) {
        if !task.poll_ready(&self.state) {
            self.withheld.push(task);
            return;
        }

        report.merged += 1;
        if task.finalize(&mut self.state, &mut self.pending) == Finalized::Notified {
            report.notified += 1;
        }
    }

    /// Finalize a follow-up the manager refused as failed. Anything its
    /// merge queues is retried on the next tick.
    fn reject(&mut self, task: Task, report: &mut TickReport) {
        warn!(
            task_id = %task.id(),
            kind = %task.kind(),
            "Follow-up task rejected by the task manager"
        );
        report.merged += 1;
        if task.reject("task manager is shut down", &mut self.state, &mut self.pending)
            == Finalized::Notified
        {
            report.notified += 1;
        }
    }

    /// Flush follow-up work, let the worker finish everything submitted and
    /// stop it. Results completing after this point are not delivered.
    pub fn shutdown(mut self) -> Result<ManagerStats> {
        for task in std::mem::take(&mut self.pending) {
            self.manager.submit(task)?;
        }
        self.manager.shutdown()?;
        Ok(self.manager.stats())
    }
}
