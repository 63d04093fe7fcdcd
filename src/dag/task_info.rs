// src/dag/task_info.rs

//! Task metadata and per-run state.

use serde::Serialize;
use serde_json::Value;

use crate::ledger::cost::retry_cost;
use crate::types::TaskStatus;

/// Canonical task id type used throughout the crate.
pub type TaskId = String;

/// Opaque parameter payload handed to workers.
pub type Params = serde_json::Map<String, Value>;

/// A node of the task graph: static definition plus mutable run state.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub agent: String,
    pub kind: String,
    pub params: Params,
    /// Direct dependencies (ids in `after`), deduplicated.
    pub depends_on: Vec<TaskId>,
    pub cost_estimate: u64,
    pub timeout_seconds: u64,
    pub retry_max: u32,

    pub status: TaskStatus,
    /// Sum of every attempt charged to the ledger.
    pub actual_cost: u64,
    /// Attempts consumed after the first one.
    pub retry_count: u32,
    pub result: Option<Value>,
    pub error_message: Option<String>,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: TaskId,
        agent: String,
        kind: String,
        params: Params,
        depends_on: Vec<TaskId>,
        cost_estimate: u64,
        retry_max: u32,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            id,
            agent,
            kind,
            params,
            depends_on,
            cost_estimate,
            timeout_seconds,
            retry_max,
            status: TaskStatus::Pending,
            actual_cost: 0,
            retry_count: 0,
            result: None,
            error_message: None,
        }
    }

    /// Cost of the next attempt: the estimate for the first attempt, then
    /// compounding by 1.5 per retry.
    pub fn next_attempt_cost(&self) -> u64 {
        retry_cost(self.cost_estimate, self.retry_count)
    }
}

/// Description of a task attempt the executor hands to the worker boundary.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub id: TaskId,
    pub agent: String,
    pub kind: String,
    pub params: Params,
    pub timeout_seconds: u64,
    /// Zero for the first attempt, `n` for the n-th retry.
    pub attempt: u32,
    /// Credits charged for this attempt.
    pub cost: u64,
}

impl ScheduledTask {
    pub fn from_task(task: &Task, cost: u64) -> Self {
        Self {
            id: task.id.clone(),
            agent: task.agent.clone(),
            kind: task.kind.clone(),
            params: task.params.clone(),
            timeout_seconds: task.timeout_seconds,
            attempt: task.retry_count,
            cost,
        }
    }
}
