use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single task.
///
/// - `Pending`: waiting on dependencies, or waiting for a retry.
/// - `Ready`: every dependency is `Completed`; about to be dispatched.
/// - `InProgress`: handed to the worker boundary.
/// - `Completed`, `Failed`, `Skipped`: terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Skipped
        )
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Ready => "READY",
            TaskStatus::InProgress => "IN_PROGRESS",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Ok(TaskStatus::Pending),
            "READY" => Ok(TaskStatus::Ready),
            "IN_PROGRESS" => Ok(TaskStatus::InProgress),
            "COMPLETED" => Ok(TaskStatus::Completed),
            "FAILED" => Ok(TaskStatus::Failed),
            "SKIPPED" => Ok(TaskStatus::Skipped),
            other => Err(format!("invalid task status: {other}")),
        }
    }
}

/// Overall state of one graph run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GraphStatus {
    /// Validated, not started.
    Pending,
    /// The executor loop is driving it.
    Running,
    /// Every task reached a terminal state (individual tasks may have failed).
    Completed,
    /// The run deadline (or a shutdown request) ended the run.
    TimedOut,
    /// Nothing in flight and no ready task could be afforded.
    BudgetExhausted,
}

impl Default for GraphStatus {
    fn default() -> Self {
        GraphStatus::Pending
    }
}

impl fmt::Display for GraphStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GraphStatus::Pending => "PENDING",
            GraphStatus::Running => "RUNNING",
            GraphStatus::Completed => "COMPLETED",
            GraphStatus::TimedOut => "TIMED_OUT",
            GraphStatus::BudgetExhausted => "BUDGET_EXHAUSTED",
        };
        f.write_str(s)
    }
}
