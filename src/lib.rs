#![allow(clippy::doc_markdown)] // Allow technical terms like JoinSet, FanOut in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Relay Core Rust
//!
//! Cross-thread asynchronous task orchestration for clients of a rate-limited
//! remote service.
//!
//! ## Overview
//!
//! A client thread (a UI loop, a game loop, any caller that must never block)
//! submits tasks. A dedicated worker thread performs the remote calls. Results
//! are merged back into client-owned state and reported to callers on the
//! client thread, once per logical operation.
//!
//! ## Architecture
//!
//! ```text
//!  client thread                         worker thread (current-thread runtime)
//!  ─────────────                         ──────────────────────────────────────
//!  Client::submit ──→ serial queue  ───→ one in flight, strict FIFO
//!                 ──→ parallel set  ───→ all in flight
//!                                              │ construct → call → process
//!  Client::tick   ←── output queue  ←──────────┘
//!     │ poll (local tasks) → merge → notify
//!     └─→ follow-up tasks (continuations, fan-out) submitted at end of tick
//! ```
//!
//! ## Key Features
//!
//! - **Serial and parallel dispatch**: FIFO with at most one serial task in
//!   flight, unbounded concurrency for parallel tasks
//! - **Fan-out / fan-in**: [`operations::FanOut`] tracks sub-tasks in a status
//!   table and reports one combined result
//! - **Batch continuation**: [`operations::BatchContinuation`] splits
//!   oversized inputs into slices under the per-call maximum
//! - **Subscription dedup**: at most one push subscription per subject until
//!   the platform resumes
//! - **Panic isolation**: a panicking task fails; the worker keeps running
//!
//! ## Module Organization
//!
//! - [`client`] - Client tick, submission API and client-owned state
//! - [`manager`] - Worker thread, submission queues and the output queue
//! - [`task`] - Task lifecycle, completion routing and the `Operation` trait
//! - [`operations`] - Built-in operations
//! - [`service`] - Remote service abstraction
//! - [`state_machine`] - Task states and events
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_core::config::RelayConfig;
//! use relay_core::operations::RemoteCall;
//! use relay_core::service::{RemoteRequest, RemoteResponse, RemoteService};
//! use relay_core::error::RemoteFault;
//! use relay_core::{Client, DispatchMode};
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait::async_trait]
//! impl RemoteService for Echo {
//!     async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteFault> {
//!         Ok(RemoteResponse::new(request.payload))
//!     }
//! }
//!
//! # fn example() -> relay_core::Result<()> {
//! let mut client = Client::new(RelayConfig::default(), Arc::new(Echo))?;
//! client.submit(
//!     RemoteCall::new("profile.get", serde_json::json!({"subject": "alice"})),
//!     DispatchMode::Parallel,
//!     |report| println!("profile.get finished: success={}", report.success),
//! )?;
//!
//! loop {
//!     let tick = client.tick()?;
//!     if tick.notified > 0 {
//!         break;
//!     }
//! }
//! client.shutdown()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit, integration and property tests
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod manager;
pub mod operations;
pub mod service;
pub mod state_machine;
pub mod task;

pub use client::{Client, ClientState, TickReport};
pub use config::RelayConfig;
pub use error::{RelayError, RemoteFault, Result};
pub use manager::{ManagerStats, TaskManager};
pub use service::{RemoteRequest, RemoteResponse, RemoteService, ServiceContext};
pub use state_machine::{TaskEvent, TaskState};
pub use task::{Completion, DispatchMode, MergeContext, Operation, Task, TaskId, TaskOutcome, TaskReport};
