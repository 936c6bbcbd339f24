//! # Fan-out / Fan-in Aggregation
//!
//! A parent task's merge step decomposes one caller-visible operation into
//! several independent sub-tasks and reports a single combined result.
//!
//! ```text
//! parent.merge ─→ FanOut::submit
//!                   ├─→ sub-task "details"   ─┐ each sub-task's merge writes
//!                   ├─→ sub-task "presence"  ─┤ its entry in the StatusTable
//!                   └─→ Aggregator (last) ────┴─→ polled every tick until all
//!                                                entries are terminal, then
//!                                                merges and notifies once
//! ```
//!
//! The status table lives in [`ClientState`] under a unique [`AggregateId`].
//! Sub-tasks carry that id instead of a pointer to the aggregator, and every
//! write happens on the client thread.

use crate::client::ClientState;
use crate::constants::AGGREGATE_ERROR_SEPARATOR;
use crate::error::{RelayError, Result};
use crate::service::{RemoteRequest, ServiceContext};
use crate::state_machine::TaskState;
use crate::task::{Completion, DispatchMode, MergeContext, Operation, TaskId, TaskOutcome};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use uuid::Uuid;

pub type AggregateId = Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableEntry {
    pub state: TaskState,
    pub error: Option<String>,
    pub contribution: Option<Value>,
}

impl TableEntry {
    fn new(state: TaskState) -> Self {
        Self {
            state,
            error: None,
            contribution: None,
        }
    }
}

/// Sub-task kind → state, kept in kind order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusTable {
    label: String,
    entries: BTreeMap<String, TableEntry>,
}

impl StatusTable {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn insert(&mut self, kind: impl Into<String>, state: TaskState) {
        self.entries.insert(kind.into(), TableEntry::new(state));
    }

    pub fn entry(&self, kind: &str) -> Option<&TableEntry> {
        self.entries.get(kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Store a sub-task's terminal state. Unknown kinds and non-terminal
    /// states are rejected.
    pub fn record(
        &mut self,
        kind: &str,
        state: TaskState,
        error: Option<String>,
        contribution: Option<Value>,
    ) -> Result<()> {
        if !state.is_terminal() {
            return Err(RelayError::StateTransition(format!(
                "sub-task '{kind}' reported non-terminal state '{state}'"
            )));
        }
        let entry = self.entries.get_mut(kind).ok_or_else(|| {
            RelayError::StateTransition(format!(
                "'{kind}' is not tracked by aggregate '{}'",
                self.label
            ))
        })?;
        entry.state = state;
        entry.error = error;
        entry.contribution = contribution;
        Ok(())
    }

    /// True once every entry is `Done` or `Failed`. An empty table never is.
    pub fn is_terminal(&self) -> bool {
        !self.entries.is_empty() && self.entries.values().all(|e| e.state.is_terminal())
    }

    /// `None` while any entry is outstanding; otherwise `Ok` when nothing
    /// failed, or an `AggregateFailure` naming every failed entry.
    pub fn verdict(&self) -> Option<Result<()>> {
        if !self.is_terminal() {
            return None;
        }

        let failures: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.state.is_failed())
            .map(|(kind, entry)| {
                format!(
                    "{kind}: {}",
                    entry.error.as_deref().unwrap_or("failed without a description")
                )
            })
            .collect();

        if failures.is_empty() {
            Some(Ok(()))
        } else {
            Some(Err(RelayError::AggregateFailure(
                failures.join(AGGREGATE_ERROR_SEPARATOR),
            )))
        }
    }

    /// One JSON object holding every entry's contribution, keyed by kind
    pub fn combined(&self) -> Value {
        let combined: Map<String, Value> = self
            .entries
            .iter()
            .map(|(kind, entry)| {
                (
                    kind.clone(),
                    entry.contribution.clone().unwrap_or(Value::Null),
                )
            })
            .collect();
        Value::Object(combined)
    }
}

/// Local task that waits on a status table and reports the combined result
#[derive(Debug, Clone)]
pub struct Aggregator {
    id: AggregateId,
    label: String,
}

impl Aggregator {
    pub fn new(id: AggregateId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    pub fn id(&self) -> AggregateId {
        self.id
    }
}

impl Operation for Aggregator {
    fn kind(&self) -> &str {
        &self.label
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        Ok(None)
    }

    fn poll(&mut self, client: &ClientState) -> Option<Result<()>> {
        match client.aggregate(&self.id) {
            Some(table) => table.verdict(),
            None => Some(Err(RelayError::StateTransition(format!(
                "status table for aggregate '{}' is missing",
                self.label
            )))),
        }
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        let table = ctx.client_mut().remove_aggregate(&self.id)?;
        let combined = table.combined();

        debug!(
            aggregate_id = %self.id,
            label = %self.label,
            entries = table.len(),
            success = outcome.is_success(),
            "Aggregate finalized"
        );

        ctx.client_mut()
            .insert_result(self.label.clone(), combined.clone());
        Some(combined)
    }
}

/// Result of [`FanOut::submit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanOutSubmission {
    Dispatched {
        aggregate_id: AggregateId,
        aggregator: TaskId,
        sub_tasks: usize,
    },
    /// Nothing needed dispatching; no aggregator was created and the
    /// completion stays with the parent, which notifies synchronously.
    Empty,
}

/// Builder for a set of sub-tasks reported through one aggregator
pub struct FanOut {
    label: String,
    tracked: Vec<(String, Box<dyn Operation>, DispatchMode)>,
    skipped: Vec<String>,
}

impl FanOut {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            tracked: Vec::new(),
            skipped: Vec::new(),
        }
    }

    fn has_kind(&self, kind: &str) -> bool {
        self.tracked.iter().any(|(k, _, _)| k == kind) || self.skipped.iter().any(|k| k == kind)
    }

    /// Dispatch `operation` as the sub-task for `kind`
    pub fn track(mut self, kind: impl Into<String>, operation: impl Operation, mode: DispatchMode) -> Self {
        let kind = kind.into();
        if self.has_kind(&kind) {
            warn!(label = %self.label, kind = %kind, "Duplicate fan-out kind ignored");
            return self;
        }
        let operation: Box<dyn Operation> = Box::new(operation);
        self.tracked.push((kind, operation, mode));
        self
    }

    /// Declare `kind` unnecessary; its entry starts out `Done`
    pub fn skip(mut self, kind: impl Into<String>) -> Self {
        let kind = kind.into();
        if self.has_kind(&kind) {
            warn!(label = %self.label, kind = %kind, "Duplicate fan-out kind ignored");
            return self;
        }
        self.skipped.push(kind);
        self
    }

    /// Number of sub-tasks that will actually be dispatched
    pub fn dispatched(&self) -> usize {
        self.tracked.len()
    }

    /// Install the status table, queue every sub-task and then the
    /// aggregator. The aggregator takes over the parent's completion.
    pub fn submit(self, ctx: &mut MergeContext<'_>) -> FanOutSubmission {
        if self.tracked.is_empty() {
            debug!(label = %self.label, skipped = self.skipped.len(), "Fan-out has no sub-tasks");
            return FanOutSubmission::Empty;
        }

        let aggregate_id = Uuid::new_v4();
        let mut table = StatusTable::new(self.label.clone());
        for kind in &self.skipped {
            table.insert(kind.clone(), TaskState::Done);
        }
        for (kind, _, _) in &self.tracked {
            table.insert(kind.clone(), TaskState::NotStarted);
        }
        ctx.client_mut().insert_aggregate(aggregate_id, table);

        let sub_tasks = self.tracked.len();
        for (kind, operation, mode) in self.tracked {
            ctx.submit(operation, mode, Completion::Aggregate { id: aggregate_id, kind });
        }

        let completion = ctx.take_completion().unwrap_or(Completion::Detached);
        let aggregator = ctx.submit(
            Box::new(Aggregator::new(aggregate_id, self.label.clone())),
            DispatchMode::Parallel,
            completion,
        );

        debug!(
            label = %self.label,
            aggregate_id = %aggregate_id,
            sub_tasks = sub_tasks,
            "Fan-out submitted"
        );

        FanOutSubmission::Dispatched {
            aggregate_id,
            aggregator,
            sub_tasks,
        }
    }
}
