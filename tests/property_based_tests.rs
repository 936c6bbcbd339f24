mod common;

use common::*;
use proptest::prelude::*;
use relay_core::operations::{BatchContinuation, RemoteCall, SubjectLookup};
use relay_core::DispatchMode;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

proptest! {
    // Every case spins up a worker thread; keep the case count small
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: a batch chain sends every subject exactly once in slices no
    /// larger than the maximum, and reports one terminal state
    #[test]
    fn batch_chain_covers_every_subject_once(len in 1usize..200, max in 1usize..60) {
        let service = MockService::lookup().into_arc();
        let mut client = client_with(Arc::clone(&service), test_config());
        let recorder = Recorder::new();
        let subjects: Vec<String> = (0..len).map(|i| format!("s{i}")).collect();

        client
            .submit(
                BatchContinuation::new(SubjectLookup::new("lookup", "looked_up"), subjects.clone(), max),
                DispatchMode::Parallel,
                recorder.callback(),
            )
            .unwrap();
        tick_until(&mut client, |_| !recorder.is_empty());

        let calls = service.calls();
        prop_assert_eq!(calls.len(), len.div_ceil(max));

        let mut seen = HashSet::new();
        let mut sent = Vec::new();
        for call in &calls {
            let slice = call.payload["subjects"].as_array().unwrap();
            prop_assert!(!slice.is_empty() && slice.len() <= max);
            for subject in slice {
                let subject = subject.as_str().unwrap().to_string();
                prop_assert!(seen.insert(subject.clone()), "{} sent twice", subject);
                sent.push(subject);
            }
        }
        prop_assert_eq!(sent, subjects);

        let reports = recorder.reports();
        prop_assert_eq!(reports.len(), 1);
        prop_assert!(reports[0].success);
    }

    /// Property: serial completion order equals submission order for any
    /// mix of response latencies
    #[test]
    fn serial_order_survives_random_latency(delays in prop::collection::vec(0u64..15, 1..8)) {
        let latencies = delays.clone();
        let service = MockService::echo()
            .with_delay(move |request| {
                let n = request.payload["n"].as_u64().unwrap_or(0) as usize;
                Duration::from_millis(latencies[n])
            })
            .into_arc();
        let mut client = client_with(Arc::clone(&service), test_config());
        let recorder = Recorder::new();

        for n in 0..delays.len() {
            client
                .submit(
                    RemoteCall::new("ordered", json!({ "n": n })),
                    DispatchMode::Serial,
                    recorder.callback(),
                )
                .unwrap();
        }
        tick_until(&mut client, |_| recorder.len() == delays.len());

        let order: Vec<u64> = recorder
            .reports()
            .iter()
            .map(|report| report.payload.as_ref().unwrap()["n"].as_u64().unwrap())
            .collect();
        prop_assert_eq!(order, (0..delays.len() as u64).collect::<Vec<_>>());
        prop_assert_eq!(service.peak_in_flight(), 1);
    }
}
