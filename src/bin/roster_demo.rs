//! # Roster Refresh Demo
//!
//! Drives a full roster refresh against a simulated remote service: one
//! member listing, batched profile and presence lookups, a relationship
//! query and a subscription per member, all reported through one callback.
//!
//! Configuration comes from `RELAY_*` environment variables, e.g.
//! `RELAY_MAX_BATCH_SIZE=25 RELAY_ROSTER_SIZE=120 cargo run --bin roster-demo`.

use anyhow::{bail, Context};
use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::constants::{operations, results};
use relay_core::logging::init_structured_logging;
use relay_core::operations::RosterRefresh;
use relay_core::{
    Client, DispatchMode, RelayConfig, RemoteFault, RemoteRequest, RemoteResponse, RemoteService,
    TaskReport,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};

const DEFAULT_ROSTER_SIZE: usize = 120;
const DEADLINE: Duration = Duration::from_secs(10);

/// In-process stand-in for the remote service with a small per-call latency
struct SimulatedService {
    roster_size: usize,
    latency: Duration,
}

impl SimulatedService {
    fn subjects(payload: &Value) -> Vec<String> {
        payload
            .get("subjects")
            .and_then(Value::as_array)
            .map(|subjects| {
                subjects
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn keyed(subjects: &[String], value: impl Fn(usize, &str) -> Value) -> Value {
        let entries: Map<String, Value> = subjects
            .iter()
            .enumerate()
            .map(|(index, subject)| (subject.clone(), value(index, subject)))
            .collect();
        json!({ "results": entries })
    }
}

#[async_trait]
impl RemoteService for SimulatedService {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteFault> {
        tokio::time::sleep(self.latency).await;

        let payload = match request.operation.as_str() {
            operations::ROSTER_LIST => {
                let members: Vec<String> =
                    (0..self.roster_size).map(|i| format!("member_{i:03}")).collect();
                json!({ "members": members })
            }
            operations::PROFILE_LOOKUP => {
                let subjects = Self::subjects(&request.payload);
                Self::keyed(&subjects, |_, subject| json!({ "display_name": subject.to_uppercase() }))
            }
            operations::PRESENCE_LOOKUP => {
                let subjects = Self::subjects(&request.payload);
                Self::keyed(&subjects, |index, _| {
                    json!(if index % 3 == 0 { "online" } else { "offline" })
                })
            }
            operations::RELATIONSHIP_STATUS => {
                let subjects = Self::subjects(&request.payload);
                Self::keyed(&subjects, |_, _| json!({ "status": "friend" }))
            }
            operations::SUBSCRIBE => json!({ "subscribed": true }),
            other => return Err(RemoteFault::new(other, "unknown operation")),
        };

        Ok(RemoteResponse::new(payload))
    }
}

fn roster_size() -> anyhow::Result<usize> {
    match std::env::var("RELAY_ROSTER_SIZE") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("RELAY_ROSTER_SIZE must be a number, got '{value}'")),
        Err(_) => Ok(DEFAULT_ROSTER_SIZE),
    }
}

fn main() -> anyhow::Result<()> {
    init_structured_logging();

    let config = RelayConfig::from_env().context("failed to load relay configuration")?;
    let service = Arc::new(SimulatedService {
        roster_size: roster_size()?,
        latency: Duration::from_millis(20),
    });

    info!(
        max_batch_size = config.max_batch_size,
        relationship_fields = ?config.relationship_fields,
        "Starting roster refresh demo"
    );

    let mut client = Client::new(config, service).context("failed to start relay client")?;

    let report: Arc<Mutex<Option<TaskReport>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&report);
    client.submit(
        RosterRefresh::new("friends"),
        DispatchMode::Serial,
        move |finished| *sink.lock() = Some(finished.clone()),
    )?;

    let started = Instant::now();
    while report.lock().is_none() {
        if started.elapsed() > DEADLINE {
            bail!("roster refresh did not complete within {DEADLINE:?}");
        }
        client.manager().wait_for_output(Duration::from_millis(50));
        client.tick()?;
    }

    let finished = report.lock().take().context("roster report missing")?;
    if finished.success {
        let profiles = client
            .state()
            .result(results::PROFILES)
            .and_then(Value::as_object)
            .map_or(0, Map::len);
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            profiles = profiles,
            subscriptions = client.state().subscriptions().len(),
            "Roster refresh complete"
        );
    } else {
        error!(error = ?finished.error, "Roster refresh failed");
    }

    let sections: Map<String, Value> = finished
        .payload
        .as_ref()
        .and_then(Value::as_object)
        .map(|combined| {
            combined
                .iter()
                .map(|(kind, contribution)| (kind.clone(), json!(!contribution.is_null())))
                .collect()
        })
        .unwrap_or_default();

    let stats = client.shutdown()?;
    let summary = json!({
        "success": finished.success,
        "error": finished.error,
        "sections": sections,
        "stats": stats,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
