// src/engine/mod.rs

//! Execution engine for one task graph.
//!
//! The engine drives a validated graph to a terminal state:
//! ready set → ledger charge → dispatch → outcome → state transition → repeat.
//!
//! The pure core state machine lives in [`core`]; the async/IO shell that owns
//! the event channel, the run deadline and the worker backend is implemented
//! in [`runtime`]. [`summary`] holds the serialisable end-of-run report.

use std::time::Duration;

use serde_json::Value;

use crate::dag::TaskId;

/// Result of one attempt at the worker boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Success(Value),
    Failed(String),
}

/// Events flowing into the runtime from worker attempts and signal handlers.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// An attempt finished (successfully or not).
    TaskFinished {
        task: TaskId,
        /// Attempt number the outcome belongs to; stale attempts are ignored.
        attempt: u32,
        outcome: TaskOutcome,
    },
    /// Graceful shutdown requested (e.g. Ctrl-C). Handled like the run
    /// deadline.
    ShutdownRequested,
}

/// Options for the async shell.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Overrides the graph's `timeout_minutes` when set.
    pub run_timeout: Option<Duration>,
}

pub mod core;
pub mod runtime;
pub mod summary;

pub use core::{CoreCommand, CoreRuntime, CoreStep};
pub use runtime::Runtime;
pub use summary::{RunSummary, TaskSummary};
