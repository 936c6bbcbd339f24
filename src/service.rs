//! # Remote Service Seam
//!
//! The remote service is an external collaborator. Every task issues at most
//! one opaque request through [`RemoteService::call`] from the worker thread
//! and receives either a response payload or a [`RemoteFault`].
//!
//! [`ServiceContext`] is the explicit context object handed to every task at
//! construction. It replaces ambient global state: creating one is the
//! subsystem's initialization and dropping the last reference is its teardown.

use crate::config::RelayConfig;
use crate::error::RemoteFault;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Opaque request issued to the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub operation: String,
    pub payload: Value,
}

impl RemoteRequest {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
        }
    }
}

/// Opaque response returned by the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub payload: Value,
}

impl RemoteResponse {
    pub fn new(payload: Value) -> Self {
        Self { payload }
    }
}

#[async_trait]
pub trait RemoteService: Send + Sync + 'static {
    /// Perform one remote operation. Called only from the worker thread.
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteFault>;
}

/// Shared, immutable context every task is constructed with
pub struct ServiceContext {
    id: Uuid,
    service: Arc<dyn RemoteService>,
    config: Arc<RelayConfig>,
}

impl ServiceContext {
    pub fn new(service: Arc<dyn RemoteService>, config: RelayConfig) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            service,
            config: Arc::new(config),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service(&self) -> &Arc<dyn RemoteService> {
        &self.service
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
