#![allow(dead_code)]

pub mod mock_service;

pub use mock_service::*;

use parking_lot::Mutex;
use relay_core::{Client, RelayConfig, TaskReport, TickReport};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Collects caller notifications
#[derive(Clone, Default)]
pub struct Recorder {
    reports: Arc<Mutex<Vec<TaskReport>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl FnOnce(&TaskReport) + Send + 'static {
        let reports = Arc::clone(&self.reports);
        move |report: &TaskReport| reports.lock().push(report.clone())
    }

    pub fn reports(&self) -> Vec<TaskReport> {
        self.reports.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn test_config() -> RelayConfig {
    RelayConfig {
        environment: "test".to_string(),
        ..RelayConfig::default()
    }
}

pub fn client_with(service: Arc<MockService>, config: RelayConfig) -> Client {
    Client::new(config, service).expect("client should start")
}

/// Tick until `done` holds, returning every tick report. Panics after
/// [`TEST_TIMEOUT`].
pub fn tick_until(client: &mut Client, mut done: impl FnMut(&Client) -> bool) -> Vec<TickReport> {
    let started = Instant::now();
    let mut ticks = Vec::new();
    while !done(client) {
        assert!(
            started.elapsed() < TEST_TIMEOUT,
            "condition not reached within {TEST_TIMEOUT:?} after {} ticks",
            ticks.len()
        );
        client.manager().wait_for_output(Duration::from_millis(10));
        ticks.push(client.tick().expect("tick should succeed"));
    }
    ticks
}

/// Tick a few more times to make sure nothing else arrives
pub fn settle(client: &mut Client) -> Vec<TickReport> {
    let mut ticks = Vec::new();
    for _ in 0..5 {
        client.manager().wait_for_output(Duration::from_millis(20));
        ticks.push(client.tick().expect("tick should succeed"));
    }
    ticks
}
