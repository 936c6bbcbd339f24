use crate::error::{RelayError, Result};
use crate::service::{RemoteRequest, RemoteResponse, ServiceContext};
use crate::task::{MergeContext, Operation, TaskOutcome};
use serde_json::Value;

/// A single remote call whose response is optionally published in client
/// state under `result_key`.
#[derive(Debug, Clone)]
pub struct RemoteCall {
    operation: String,
    payload: Value,
    result_key: Option<String>,
    response: Option<Value>,
}

impl RemoteCall {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
            result_key: None,
            response: None,
        }
    }

    /// Publish the response under `key` when the call succeeds
    pub fn store_as(mut self, key: impl Into<String>) -> Self {
        self.result_key = Some(key.into());
        self
    }
}

impl Operation for RemoteCall {
    fn kind(&self) -> &str {
        &self.operation
    }

    fn construct(&mut self, _context: &ServiceContext) -> Result<Option<RemoteRequest>> {
        if self.operation.trim().is_empty() {
            return Err(RelayError::Construction(
                "remote operation name is empty".to_string(),
            ));
        }
        Ok(Some(RemoteRequest::new(
            self.operation.clone(),
            self.payload.clone(),
        )))
    }

    fn process(&mut self, response: RemoteResponse) -> Result<()> {
        self.response = Some(response.payload);
        Ok(())
    }

    fn merge(&mut self, outcome: &TaskOutcome, ctx: &mut MergeContext<'_>) -> Option<Value> {
        if !outcome.is_success() {
            return None;
        }

        let response = self.response.take()?;
        if let Some(key) = &self.result_key {
            ctx.client_mut().insert_result(key.clone(), response.clone());
        }
        Some(response)
    }
}
