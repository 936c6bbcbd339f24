use crate::operations::aggregator::{AggregateId, StatusTable};
use crate::operations::subscription::SubscriptionCache;
use crate::state_machine::TaskState;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// State owned by the client thread.
///
/// Only merge steps receive `&mut ClientState`, which keeps every write on
/// the client thread and leaves this type free of locks.
#[derive(Debug, Default)]
pub struct ClientState {
    results: HashMap<String, Value>,
    aggregates: HashMap<AggregateId, StatusTable>,
    subscriptions: SubscriptionCache,
}

impl ClientState {
    pub fn result(&self, key: &str) -> Option<&Value> {
        self.results.get(key)
    }

    pub fn results(&self) -> &HashMap<String, Value> {
        &self.results
    }

    /// Publish a merged result, returning the previous value if any
    pub fn insert_result(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.results.insert(key.into(), value)
    }

    /// Merge the entries of a JSON object into the object stored under `key`
    pub fn extend_result(&mut self, key: &str, entries: &serde_json::Map<String, Value>) {
        let slot = self
            .results
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));

        match slot {
            Value::Object(existing) => {
                for (name, value) in entries {
                    existing.insert(name.clone(), value.clone());
                }
            }
            other => *other = Value::Object(entries.clone()),
        }
    }

    pub fn subscriptions(&self) -> &SubscriptionCache {
        &self.subscriptions
    }

    pub fn subscriptions_mut(&mut self) -> &mut SubscriptionCache {
        &mut self.subscriptions
    }

    pub fn aggregate(&self, id: &AggregateId) -> Option<&StatusTable> {
        self.aggregates.get(id)
    }

    /// Number of fan-outs still waiting on sub-tasks
    pub fn open_aggregates(&self) -> usize {
        self.aggregates.len()
    }

    pub(crate) fn insert_aggregate(&mut self, id: AggregateId, table: StatusTable) {
        self.aggregates.insert(id, table);
    }

    pub(crate) fn remove_aggregate(&mut self, id: &AggregateId) -> Option<StatusTable> {
        self.aggregates.remove(id)
    }

    /// Write a sub-task's terminal state into its aggregator's table entry
    pub(crate) fn record_aggregate_entry(
        &mut self,
        id: AggregateId,
        kind: &str,
        state: TaskState,
        error: Option<String>,
        contribution: Option<Value>,
    ) {
        let Some(table) = self.aggregates.get_mut(&id) else {
            warn!(aggregate_id = %id, kind = %kind, "Sub-task finished after its aggregate was finalized");
            return;
        };

        if let Err(err) = table.record(kind, state, error, contribution) {
            warn!(aggregate_id = %id, kind = %kind, error = %err, "Could not record sub-task state");
        }
    }
}
