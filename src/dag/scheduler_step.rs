// src/dag/scheduler_step.rs

//! Step-by-step result types for the task state machine.

use crate::dag::task_info::TaskId;

/// What changed when one worker outcome was applied.
///
/// Useful for tests that drive the state machine by hand and want to assert
/// on individual transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeStep {
    /// The task completed successfully.
    pub completed: Option<TaskId>,
    /// The task went back to `Pending` for another attempt.
    pub retried: Option<TaskId>,
    /// The task was marked `Failed`.
    pub failed: Option<TaskId>,
    /// Dependents newly marked `Skipped` because of `failed`.
    pub skipped: Vec<TaskId>,
}

/// Tasks whose state changed when the run was forcibly ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpireStep {
    pub failed: Vec<TaskId>,
    pub skipped: Vec<TaskId>,
}
