//! # Subscription Dedup Cache
//!
//! Push-update subscriptions are requested at most once per subject. The
//! cache entry is written *before* the request is confirmed so two sub-tasks
//! merging in the same tick cannot both issue a request for one subject.
//! A failed subscribe keeps its optimistic entry; subscribing is best effort.
//! The whole cache is dropped on resume, when the platform invalidates
//! every push subscription.

use crate::client::ClientState;
use crate::constants::operations::SUBSCRIBE;
use crate::error::Result;
use crate::service::{RemoteRequest, ServiceContext};
use crate::task::{Completion, DispatchMode, MergeContext, Operation, Task, TaskOutcome};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Subject → confirmed. An entry exists from the moment a request is issued;
/// the flag turns true once the service acknowledged it.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionCache {
    entries: HashMap<String, bool>,
}

impl SubscriptionCache {
    /// Record `subject` if unseen. Returns `true` when a request should be issued.
    pub fn mark(&mut self, subject: &str) -> bool {
        if self.entries.contains_key(subject) {
            return false;
        }
        self.entries.insert(subject.to_string(), false);
        true
    }

    pub fn confirm(&mut self, subject: &str) {
        if let Some(confirmed) = self.entries.get_mut(subject) {
            *confirmed = true;
        }
    }

    pub fn contains(&self, subject: &str) -> bool {
        self.entries.contains_key(subject)
    }

    pub fn is_confirmed(&self, subject: &str) -> bool {
        self.entries.get(subject).copied().unwrap_or(false)
    }

    /// Forget every subject, returning how many were cached
    pub fn reset(&mut self) -> usize {
        let cleared = self.entries.len();
        self.entries.clear();
        cleared
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Begin receiving push updates for one subject
#[derive(Debug, Clone)]
pub struct Subscribe {
    subject: String,
}

impl Subscribe {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
        }
    }
}

impl Operation for Subscribe {
    fn kind(&self) -> &str {
        SUBSCRIBE
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        Ok(Some(RemoteRequest::new(
            SUBSCRIBE,
            json!({ "subject": self.subject }),
        )))
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        if outcome.is_success() {
            ctx.client_mut().subscriptions_mut().confirm(&self.subject);
        } else {
            warn!(
                subject = %self.subject,
                error = outcome.error.as_deref().unwrap_or("unknown"),
                "Subscribe failed; keeping optimistic cache entry"
            );
        }
        None
    }
}

/// Mark every unseen subject and queue one detached `Subscribe` per subject
pub(crate) fn subscribe_new<I, S>(
    client: &mut ClientState,
    context: &Arc<ServiceContext>,
    pending: &mut Vec<Task>,
    subjects: I,
) -> usize
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut issued = 0;
    for subject in subjects {
        let subject = subject.into();
        if !client.subscriptions_mut().mark(&subject) {
            continue;
        }
        pending.push(Task::new(
            Arc::clone(context),
            Box::new(Subscribe::new(subject)),
            DispatchMode::Parallel,
            Completion::Detached,
        ));
        issued += 1;
    }

    if issued > 0 {
        debug!(issued = issued, cached = client.subscriptions().len(), "Subscriptions queued");
    }
    issued
}
