use async_trait::async_trait;
use parking_lot::Mutex;
use relay_core::{RemoteFault, RemoteRequest, RemoteResponse, RemoteService};
use serde_json::{json, Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

type Handler = dyn Fn(&RemoteRequest) -> Result<Value, String> + Send + Sync;
type Delay = dyn Fn(&RemoteRequest) -> Duration + Send + Sync;

/// One request observed by the mock service
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub payload: Value,
    pub started_at: Instant,
    pub finished_at: Instant,
}

/// Scriptable remote service.
///
/// Responses come from a handler closure; an `Err(message)` becomes a
/// `RemoteFault`. Every call is recorded along with how many calls were in
/// flight at once.
pub struct MockService {
    handler: Box<Handler>,
    delay: Box<Delay>,
    calls: Mutex<Vec<RecordedCall>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockService {
    pub fn new(handler: impl Fn(&RemoteRequest) -> Result<Value, String> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            delay: Box::new(|_| Duration::ZERO),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Echo every request payload back
    pub fn echo() -> Self {
        Self::new(|request| Ok(request.payload.clone()))
    }

    /// Answer `{ "subjects": [...] }` requests with one entry per subject
    pub fn lookup() -> Self {
        Self::new(|request| Ok(keyed_by_subject(request, |subject| json!(subject.to_uppercase()))))
    }

    pub fn with_delay(mut self, delay: impl Fn(&RemoteRequest) -> Duration + Send + Sync + 'static) -> Self {
        self.delay = Box::new(delay);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_for(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls_for(operation).len()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteService for MockService {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteFault> {
        let started_at = Instant::now();
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        let delay = (self.delay)(&request);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = (self.handler)(&request);
        self.calls.lock().push(RecordedCall {
            operation: request.operation.clone(),
            payload: request.payload.clone(),
            started_at,
            finished_at: Instant::now(),
        });

        result
            .map(RemoteResponse::new)
            .map_err(|message| RemoteFault::new(request.operation, message))
    }
}

/// Subjects listed in a `{ "subjects": [...] }` payload
pub fn subjects_of(request: &RemoteRequest) -> Vec<String> {
    request
        .payload
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

/// `{ "results": { subject: value, ... } }` for every subject in the request
pub fn keyed_by_subject(request: &RemoteRequest, value: impl Fn(&str) -> Value) -> Value {
    let entries: Map<String, Value> = subjects_of(request)
        .into_iter()
        .map(|subject| {
            let entry = value(&subject);
            (subject, entry)
        })
        .collect();
    json!({ "results": entries })
}
