//! # Tasks
//!
//! A task has a four-step lifecycle:
//!
//! ```text
//!   worker thread                      client thread
//!   ─────────────                      ─────────────
//!   construct ──→ remote call ──→ process ──→ [output queue] ──→ merge ──→ notify
//! ```
//!
//! The task-specific parts live behind the [`Operation`] trait; [`Task`] owns
//! the generic state machine, error capture and completion routing.

pub mod completion;
pub mod lifecycle;
pub mod merge;
pub mod operation;

pub use completion::{Completion, CompletionCallback, TaskReport};
pub use lifecycle::{DispatchMode, Finalized, Task, TaskId};
pub use merge::MergeContext;
pub use operation::{Operation, TaskOutcome};
