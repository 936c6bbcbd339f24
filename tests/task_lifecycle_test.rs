mod common;

use common::*;
use parking_lot::Mutex;
use relay_core::error::Result;
use relay_core::operations::RemoteCall;
use relay_core::{
    DispatchMode, MergeContext, Operation, RemoteRequest, RemoteResponse, ServiceContext,
    TaskOutcome,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// Records when its merge runs and how the outcome looked
struct Journaled {
    journal: Arc<Mutex<Vec<String>>>,
    panic_in_process: bool,
}

impl Operation for Journaled {
    fn kind(&self) -> &str {
        "journaled"
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        Ok(Some(RemoteRequest::new("journaled", json!({}))))
    }

    fn process(&mut self, _response: RemoteResponse) -> Result<()> {
        if self.panic_in_process {
            panic!("response decoder exploded");
        }
        Ok(())
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        ctx.client_mut().insert_result("journaled", json!(outcome.is_success()));
        self.journal.lock().push(format!("merge:{}", outcome.state));
        Some(json!("merged"))
    }
}

#[test]
fn test_successful_call_merges_and_notifies_once() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(Arc::clone(&service), test_config());
    let recorder = Recorder::new();

    client
        .submit(
            RemoteCall::new("profile.get", json!({"subject": "alice"})).store_as("profile"),
            DispatchMode::Parallel,
            recorder.callback(),
        )
        .unwrap();

    tick_until(&mut client, |_| !recorder.is_empty());
    settle(&mut client);

    let reports = recorder.reports();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].success);
    assert_eq!(reports[0].kind, "profile.get");
    assert_eq!(reports[0].payload, Some(json!({"subject": "alice"})));
    assert_eq!(client.state().result("profile"), Some(&json!({"subject": "alice"})));
    assert_eq!(service.call_count("profile.get"), 1);
}

#[test]
fn test_remote_fault_is_reported_as_failure() {
    let service = MockService::new(|_| Err("rate limited".to_string())).into_arc();
    let mut client = client_with(service, test_config());
    let recorder = Recorder::new();

    client
        .submit(
            RemoteCall::new("profile.get", json!({})).store_as("profile"),
            DispatchMode::Serial,
            recorder.callback(),
        )
        .unwrap();

    tick_until(&mut client, |_| !recorder.is_empty());

    let report = &recorder.reports()[0];
    assert!(!report.success);
    assert_eq!(
        report.error.as_deref(),
        Some("Remote fault: profile.get failed: rate limited")
    );
    assert!(report.payload.is_none());
    assert!(client.state().result("profile").is_none());
}

#[test]
fn test_construction_failure_never_calls_the_service() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(Arc::clone(&service), test_config());
    let recorder = Recorder::new();

    client
        .submit(RemoteCall::new("  ", json!({})), DispatchMode::Parallel, recorder.callback())
        .unwrap();

    tick_until(&mut client, |_| !recorder.is_empty());

    let report = &recorder.reports()[0];
    assert!(!report.success);
    assert!(report.error.as_deref().unwrap().contains("operation name is empty"));
    assert!(service.calls().is_empty());
}

#[test]
fn test_panicking_task_fails_and_worker_survives() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(service, test_config());
    let journal = Arc::new(Mutex::new(Vec::new()));
    let recorder = Recorder::new();

    client
        .submit(
            Journaled {
                journal: Arc::clone(&journal),
                panic_in_process: true,
            },
            DispatchMode::Serial,
            recorder.callback(),
        )
        .unwrap();
    client
        .submit(
            RemoteCall::new("after.panic", json!({"ok": true})),
            DispatchMode::Serial,
            recorder.callback(),
        )
        .unwrap();

    tick_until(&mut client, |_| recorder.len() == 2);

    let reports = recorder.reports();
    assert!(!reports[0].success);
    assert!(reports[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("task panicked: response decoder exploded"));
    assert!(reports[1].success);
    assert_eq!(journal.lock().as_slice(), ["merge:failed"]);
    assert!(client.manager().is_running());
}

#[test]
fn test_merge_completes_before_notify() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(service, test_config());
    let journal = Arc::new(Mutex::new(Vec::new()));

    let notify_journal = Arc::clone(&journal);
    client
        .submit(
            Journaled {
                journal: Arc::clone(&journal),
                panic_in_process: false,
            },
            DispatchMode::Parallel,
            move |report| {
                notify_journal
                    .lock()
                    .push(format!("notify:{}", report.payload.clone().unwrap_or(Value::Null)));
            },
        )
        .unwrap();

    tick_until(&mut client, |_| journal.lock().len() == 2);
    settle(&mut client);

    assert_eq!(
        journal.lock().as_slice(),
        ["merge:done", "notify:\"merged\""]
    );
    assert_eq!(client.state().result("journaled"), Some(&json!(true)));
}

#[test]
fn test_detached_task_is_merged_without_notification() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(service, test_config());

    client
        .submit_detached(
            RemoteCall::new("presence.ping", json!({"at": 1})).store_as("ping"),
            DispatchMode::Parallel,
        )
        .unwrap();

    let ticks = tick_until(&mut client, |client| client.state().result("ping").is_some());

    assert_eq!(ticks.iter().map(|t| t.merged).sum::<usize>(), 1);
    assert_eq!(ticks.iter().map(|t| t.notified).sum::<usize>(), 0);

    let stats = client.shutdown().unwrap();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 0);
}

/// Local operation whose merge blows up
struct ExplodingMerge;

impl Operation for ExplodingMerge {
    fn kind(&self) -> &str {
        "exploding.merge"
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        Ok(Some(RemoteRequest::new("exploding.merge", json!({}))))
    }

    fn process(&mut self, _response: RemoteResponse) -> Result<()> {
        Ok(())
    }

    fn merge(&mut self, _outcome: &TaskOutcome, _ctx: &mut MergeContext<'_>) -> Option<Value> {
        panic!("merge bug");
    }
}

#[test]
fn test_panicking_callback_does_not_lose_other_tasks() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(service, test_config());
    let recorder = Recorder::new();

    client
        .submit(
            RemoteCall::new("first", json!({})),
            DispatchMode::Serial,
            |_| panic!("caller bug"),
        )
        .unwrap();
    client
        .submit(
            RemoteCall::new("second", json!({})).store_as("second"),
            DispatchMode::Serial,
            recorder.callback(),
        )
        .unwrap();

    // Let both land in the output queue before the first tick
    let started = std::time::Instant::now();
    while client.manager().pending_output() < 2 && started.elapsed() < TEST_TIMEOUT {
        client.manager().wait_for_output(std::time::Duration::from_millis(10));
    }

    assert_eq!(client.manager().pending_output(), 2);

    let tick = client.tick().unwrap();
    settle(&mut client);

    assert_eq!(tick.drained, 2);
    assert_eq!(tick.notified, 2);
    assert_eq!(recorder.len(), 1);
    assert!(recorder.reports()[0].success);
    assert_eq!(client.state().result("second"), Some(&json!({})));
}

#[test]
fn test_panicking_merge_reports_failure() {
    let service = MockService::echo().into_arc();
    let mut client = client_with(service, test_config());
    let recorder = Recorder::new();

    client
        .submit(ExplodingMerge, DispatchMode::Parallel, recorder.callback())
        .unwrap();
    client
        .submit(
            RemoteCall::new("after.merge", json!({"ok": true})),
            DispatchMode::Parallel,
            recorder.callback(),
        )
        .unwrap();

    tick_until(&mut client, |_| recorder.len() == 2);

    let reports = recorder.reports();
    let exploded = reports.iter().find(|r| r.kind == "exploding.merge").unwrap();
    assert!(!exploded.success);
    assert_eq!(exploded.error.as_deref(), Some("merge panicked: merge bug"));
    assert!(exploded.payload.is_none());
    assert!(reports.iter().any(|r| r.kind == "after.merge" && r.success));
}
