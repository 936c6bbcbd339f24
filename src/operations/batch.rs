//! # Batch Continuation
//!
//! Splits an oversized input collection into contiguous slices no larger than
//! the remote service's per-call maximum. Each task covers one slice
//! `[start, next)`; its merge step resubmits a continuation for the next
//! slice until the collection is exhausted.
//!
//! The continuation inherits the chain's completion, so callers (or an
//! aggregator entry) see exactly one terminal state for the whole chain:
//! `Done` after the final slice, or `Failed` at the first failing slice, after
//! which nothing further is submitted.

use crate::client::ClientState;
use crate::error::{RelayError, Result};
use crate::service::{RemoteRequest, RemoteResponse, ServiceContext};
use crate::task::{MergeContext, Operation, TaskOutcome};
use serde_json::{json, Map, Value};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-slice behavior of a batch chain
pub trait SliceOperation: Clone + Send + 'static {
    type Item: Clone + Send + Sync + 'static;

    fn kind(&self) -> &str;

    fn build_request(&self, slice: &[Self::Item]) -> Result<RemoteRequest>;

    /// Turn the slice's response into the value accumulated for the chain
    fn process_slice(&self, slice: &[Self::Item], response: RemoteResponse) -> Result<Value>;

    /// Publish one successful slice's result into client state
    fn merge_slice(&self, slice: &[Self::Item], result: &Value, client: &mut ClientState) {
        let _ = (slice, result, client);
    }
}

fn slice_end(start: usize, len: usize, max_batch_size: usize) -> usize {
    len.min(start.saturating_add(max_batch_size))
}

pub struct BatchContinuation<S: SliceOperation> {
    handler: S,
    items: Arc<[S::Item]>,
    start: usize,
    next: usize,
    max_batch_size: usize,
    slice_result: Option<Value>,
    accumulated: Vec<Value>,
}

impl<S: SliceOperation> BatchContinuation<S> {
    /// First slice of a chain over `items`
    pub fn new(handler: S, items: impl Into<Arc<[S::Item]>>, max_batch_size: usize) -> Self {
        let items = items.into();
        let next = slice_end(0, items.len(), max_batch_size);
        Self {
            handler,
            items,
            start: 0,
            next,
            max_batch_size,
            slice_result: None,
            accumulated: Vec::new(),
        }
    }

    /// Index range covered by this slice
    pub fn range(&self) -> Range<usize> {
        self.start..self.next
    }

    pub fn total(&self) -> usize {
        self.items.len()
    }

    pub fn is_final_slice(&self) -> bool {
        self.next >= self.items.len()
    }

    fn slice(&self) -> &[S::Item] {
        &self.items[self.start..self.next]
    }

    /// The slice after this one, carrying the results accumulated so far
    fn continuation(&mut self) -> Self {
        Self {
            handler: self.handler.clone(),
            items: Arc::clone(&self.items),
            start: self.next,
            next: slice_end(self.next, self.items.len(), self.max_batch_size),
            max_batch_size: self.max_batch_size,
            slice_result: None,
            accumulated: std::mem::take(&mut self.accumulated),
        }
    }
}

impl<S: SliceOperation> Operation for BatchContinuation<S> {
    fn kind(&self) -> &str {
        self.handler.kind()
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        let slice = self.slice();
        if slice.is_empty() {
            return Err(RelayError::Construction(format!(
                "no items to send for slice [{}, {}) of {}",
                self.start,
                self.next,
                self.items.len()
            )));
        }
        if slice.len() > self.max_batch_size {
            return Err(RelayError::Construction(format!(
                "slice of {} items exceeds the per-call maximum of {}",
                slice.len(),
                self.max_batch_size
            )));
        }
        self.handler.build_request(slice).map(Some)
    }

    fn process(&mut self, response: RemoteResponse) -> Result<()> {
        let result = self.handler.process_slice(self.slice(), response)?;
        self.slice_result = Some(result);
        Ok(())
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        if !outcome.is_success() {
            warn!(
                kind = %self.handler.kind(),
                start = self.start,
                next = self.next,
                total = self.items.len(),
                "Batch slice failed; chain stopped"
            );
            return None;
        }

        let result = self.slice_result.take().unwrap_or(Value::Null);
        self.handler
            .merge_slice(self.slice(), &result, ctx.client_mut());
        self.accumulated.push(result);

        if self.is_final_slice() {
            debug!(
                kind = %self.handler.kind(),
                slices = self.accumulated.len(),
                total = self.items.len(),
                "Batch chain complete"
            );
            return Some(Value::Array(std::mem::take(&mut self.accumulated)));
        }

        let continuation = self.continuation();
        debug!(
            kind = %self.handler.kind(),
            start = continuation.start,
            next = continuation.next,
            total = self.items.len(),
            "Resubmitting batch continuation"
        );
        ctx.continue_with(Box::new(continuation));
        None
    }
}

/// Looks subjects up in slices: `{ "subjects": [...] }` in, and a JSON object
/// keyed by subject out (optionally wrapped in `"results"`). Each slice's
/// entries are merged into the object published under `result_key`.
#[derive(Debug, Clone)]
pub struct SubjectLookup {
    operation: String,
    result_key: String,
    params: Map<String, Value>,
}

impl SubjectLookup {
    pub fn new(operation: impl Into<String>, result_key: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            result_key: result_key.into(),
            params: Map::new(),
        }
    }

    /// Extra request field sent with every slice alongside `"subjects"`
    pub fn with_param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

impl SliceOperation for SubjectLookup {
    type Item = String;

    fn kind(&self) -> &str {
        &self.operation
    }

    fn build_request(&self, slice: &[String]) -> Result<RemoteRequest> {
        let mut payload = self.params.clone();
        payload.insert("subjects".to_string(), json!(slice));
        Ok(RemoteRequest::new(self.operation.clone(), Value::Object(payload)))
    }

    fn process_slice(&self, slice: &[String], response: RemoteResponse) -> Result<Value> {
        let payload = match response.payload {
            Value::Object(mut object) if object.contains_key("results") => {
                object.remove("results").unwrap_or(Value::Null)
            }
            other => other,
        };

        match payload {
            Value::Object(entries) => Ok(Value::Object(entries)),
            other => Err(RelayError::Processing(format!(
                "{} returned {} for {} subjects; expected an object keyed by subject",
                self.operation,
                json_type(&other),
                slice.len()
            ))),
        }
    }

    fn merge_slice(&self, _slice: &[String], result: &Value, client: &mut ClientState) {
        if let Value::Object(entries) = result {
            client.extend_result(&self.result_key, entries);
        }
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn subjects(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("subject_{i}")).collect()
    }

    fn chain_ranges(len: usize, max: usize) -> Vec<Range<usize>> {
        let mut batch = BatchContinuation::new(SubjectLookup::new("lookup", "out"), subjects(len), max);
        let mut ranges = vec![batch.range()];
        while !batch.is_final_slice() {
            batch = batch.continuation();
            ranges.push(batch.range());
        }
        ranges
    }

    #[test]
    fn test_120_items_in_slices_of_50() {
        assert_eq!(chain_ranges(120, 50), vec![0..50, 50..100, 100..120]);
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_slice() {
        assert_eq!(chain_ranges(100, 50), vec![0..50, 50..100]);
    }

    #[test]
    fn test_continuation_carries_accumulated_results() {
        let mut batch = BatchContinuation::new(SubjectLookup::new("lookup", "out"), subjects(3), 2);
        batch.accumulated.push(json!({"subject_0": 1}));

        let next = batch.continuation();
        assert_eq!(next.range(), 2..3);
        assert_eq!(next.accumulated.len(), 1);
        assert!(batch.accumulated.is_empty());
    }

    #[test]
    fn test_params_travel_with_every_slice() {
        let lookup = SubjectLookup::new("relationship.status", "relationships")
            .with_param("fields", json!(["status"]));

        let request = lookup.build_request(&subjects(2)).unwrap();
        assert_eq!(
            request.payload,
            json!({"subjects": ["subject_0", "subject_1"], "fields": ["status"]})
        );
    }

    #[test]
    fn test_process_slice_unwraps_results_envelope() {
        let lookup = SubjectLookup::new("profile.lookup", "profiles");
        let slice = subjects(1);

        let wrapped = RemoteResponse::new(json!({"results": {"subject_0": {"name": "A"}}}));
        assert_eq!(
            lookup.process_slice(&slice, wrapped).unwrap(),
            json!({"subject_0": {"name": "A"}})
        );

        let bare = RemoteResponse::new(json!({"subject_0": "online"}));
        assert_eq!(lookup.process_slice(&slice, bare).unwrap(), json!({"subject_0": "online"}));

        let invalid = RemoteResponse::new(json!([1, 2]));
        assert!(matches!(
            lookup.process_slice(&slice, invalid),
            Err(RelayError::Processing(_))
        ));
    }

    proptest! {
        /// Slices are contiguous, non-overlapping, bounded by the maximum and
        /// cover every index exactly once
        #[test]
        fn slices_cover_collection_exactly_once(len in 1usize..500, max in 1usize..80) {
            let ranges = chain_ranges(len, max);

            prop_assert_eq!(ranges.first().map(|r| r.start), Some(0));
            prop_assert_eq!(ranges.last().map(|r| r.end), Some(len));
            for pair in ranges.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
            }
            for range in &ranges {
                prop_assert!(!range.is_empty());
                prop_assert!(range.len() <= max);
            }
            prop_assert_eq!(ranges.len(), len.div_ceil(max));
        }
    }
}
