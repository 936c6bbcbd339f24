//! # Roster Refresh
//!
//! Fetches a roster's member list, then fans out three lookups over the
//! members and reports them as one result under `"roster"`:
//!
//! - `details`: profile lookups, sliced to the per-call maximum
//! - `presence`: presence lookups, sliced the same way
//! - `relationships`: relationship status lookups, sliced the same way and
//!   skipped when no relationship fields are configured
//!
//! Every member is also subscribed to push updates through the dedup cache.

use super::aggregator::{FanOut, FanOutSubmission};
use super::batch::{BatchContinuation, SubjectLookup};
use crate::constants::{operations, results, roster_kinds};
use crate::error::{RelayError, Result};
use crate::service::{RemoteRequest, RemoteResponse, ServiceContext};
use crate::task::{DispatchMode, MergeContext, Operation, TaskOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// Response body of `roster.list`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterListing {
    #[serde(default)]
    pub members: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RosterRefresh {
    group: String,
    listing: Option<RosterListing>,
}

impl RosterRefresh {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            listing: None,
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }
}

impl Operation for RosterRefresh {
    fn kind(&self) -> &str {
        operations::ROSTER_LIST
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        if self.group.trim().is_empty() {
            return Err(RelayError::Construction(
                "roster group is empty".to_string(),
            ));
        }
        Ok(Some(RemoteRequest::new(
            operations::ROSTER_LIST,
            json!({ "group": self.group }),
        )))
    }

    fn process(&mut self, response: RemoteResponse) -> Result<()> {
        let mut listing: RosterListing = serde_json::from_value(response.payload)?;
        let mut seen = std::collections::HashSet::new();
        listing.members.retain(|member| seen.insert(member.clone()));
        self.listing = Some(listing);
        Ok(())
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        if !outcome.is_success() {
            return None;
        }

        let members = self.listing.take().unwrap_or_default().members;
        ctx.client_mut()
            .insert_result(results::ROSTER_MEMBERS, json!(&members));

        if members.is_empty() {
            info!(group = %self.group, "Roster is empty; nothing to look up");
            let empty = Value::Object(Map::new());
            ctx.client_mut().insert_result(results::ROSTER, empty.clone());
            return Some(empty);
        }

        let subscribed = ctx.subscribe(members.iter().cloned());

        let max_batch_size = ctx.config().max_batch_size;
        let fields = ctx.config().relationship_fields.clone();

        let mut fan_out = FanOut::new(results::ROSTER)
            .track(
                roster_kinds::DETAILS,
                BatchContinuation::new(
                    SubjectLookup::new(operations::PROFILE_LOOKUP, results::PROFILES),
                    members.clone(),
                    max_batch_size,
                ),
                DispatchMode::Parallel,
            )
            .track(
                roster_kinds::PRESENCE,
                BatchContinuation::new(
                    SubjectLookup::new(operations::PRESENCE_LOOKUP, results::PRESENCE),
                    members.clone(),
                    max_batch_size,
                ),
                DispatchMode::Parallel,
            );

        fan_out = if fields.is_empty() {
            fan_out.skip(roster_kinds::RELATIONSHIPS)
        } else {
            fan_out.track(
                roster_kinds::RELATIONSHIPS,
                BatchContinuation::new(
                    SubjectLookup::new(operations::RELATIONSHIP_STATUS, results::RELATIONSHIPS)
                        .with_param("fields", json!(fields)),
                    members.clone(),
                    max_batch_size,
                ),
                DispatchMode::Parallel,
            )
        };

        match fan_out.submit(ctx) {
            FanOutSubmission::Dispatched {
                aggregate_id,
                sub_tasks,
                ..
            } => {
                debug!(
                    group = %self.group,
                    members = members.len(),
                    subscribed = subscribed,
                    sub_tasks = sub_tasks,
                    aggregate_id = %aggregate_id,
                    "Roster lookups dispatched"
                );
                None
            }
            FanOutSubmission::Empty => Some(Value::Object(Map::new())),
        }
    }
}
