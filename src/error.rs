use serde::{Deserialize, Serialize};

/// Failure reported by the remote service for a single call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{operation} failed: {message}")]
pub struct RemoteFault {
    pub operation: String,
    pub message: String,
}

impl RemoteFault {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelayError {
    /// A precondition failed before any remote call was issued
    #[error("Construction error: {0}")]
    Construction(String),

    #[error("Remote fault: {0}")]
    RemoteFault(#[from] RemoteFault),

    /// The remote call succeeded but its response could not be used
    #[error("Processing error: {0}")]
    Processing(String),

    /// Derived by an aggregator from the states of its sub-tasks
    #[error("Aggregate failure: {0}")]
    AggregateFailure(String),

    #[error("State transition error: {0}")]
    StateTransition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Worker error: {0}")]
    Worker(String),
}

impl RelayError {
    /// Short category name used in structured log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::Construction(_) => "construction",
            Self::RemoteFault(_) => "remote_fault",
            Self::Processing(_) => "processing",
            Self::AggregateFailure(_) => "aggregate_failure",
            Self::StateTransition(_) => "state_transition",
            Self::Configuration(_) => "configuration",
            Self::Worker(_) => "worker",
        }
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::Processing(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RelayError>;
