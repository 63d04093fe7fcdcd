use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::dag::task_info::Params;
use crate::ledger::cost::estimate_task_cost;

/// Candidate task graph as produced by an external generator.
///
/// This is a direct mapping of the graph file:
///
/// ```toml
/// goal = "Plan a 5-day trip to Paris"
/// budget_credits = 100
/// timeout_minutes = 10
///
/// [config]
/// repair = true
///
/// [[subtasks]]
/// id = "research"
/// agent = "travel"
/// task = "research_destination"
/// cost_estimate = 20
///
/// [[subtasks]]
/// id = "flights"
/// agent = "travel"
/// task = "find_flights"
/// after = ["research"]
/// ```
///
/// The same shape is accepted as JSON. Numeric fields are signed here so the
/// validator can report negative values instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub goal: String,

    #[serde(alias = "budgetCredits")]
    pub budget_credits: i64,

    #[serde(default = "default_timeout_minutes", alias = "timeoutMinutes")]
    pub timeout_minutes: i64,

    #[serde(default)]
    pub subtasks: Vec<TaskRecord>,

    /// Run behaviour from `[config]`.
    #[serde(default)]
    pub config: RunConfig,
}

/// One entry of `subtasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Unique id. Missing ids deserialize as empty and are either rejected or
    /// regenerated by the repair pass.
    #[serde(default)]
    pub id: String,

    /// Name of the worker that executes the task.
    #[serde(default)]
    pub agent: String,

    /// Task kind, opaque to the core and interpreted by the agent.
    #[serde(default, alias = "kind")]
    pub task: String,

    #[serde(default)]
    pub params: Params,

    /// Ids that must complete before this task may run.
    #[serde(default, alias = "depends_on", alias = "dependsOn")]
    pub after: Vec<String>,

    /// `None` when the generator did not supply an estimate.
    #[serde(default, alias = "costEstimate")]
    pub cost_estimate: Option<i64>,

    #[serde(default = "default_retry_max", alias = "retryMax")]
    pub retry_max: i64,

    #[serde(default = "default_timeout_seconds", alias = "timeoutSeconds")]
    pub timeout_seconds: i64,
}

impl TaskRecord {
    /// Construct a record with every optional field at its default.
    pub fn new(id: impl Into<String>, agent: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            task: kind.into(),
            params: Params::new(),
            after: Vec::new(),
            cost_estimate: None,
            retry_max: default_retry_max(),
            timeout_seconds: default_timeout_seconds(),
        }
    }

    /// Cost estimate after applying defaults.
    ///
    /// - explicit `cost_estimate` wins
    /// - otherwise the cost model when `estimate_missing` is set
    /// - otherwise [`DEFAULT_COST_ESTIMATE`]
    pub fn effective_cost(&self, estimate_missing: bool) -> i64 {
        match self.cost_estimate {
            Some(cost) => cost,
            None if estimate_missing => {
                estimate_task_cost(&self.agent, &self.task, &self.params) as i64
            }
            None => DEFAULT_COST_ESTIMATE,
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Attempt one repair pass when validation fails.
    #[serde(default = "default_true")]
    pub repair: bool,

    /// Use the cost model for tasks without an explicit `cost_estimate`.
    #[serde(default)]
    pub estimate_missing_costs: bool,

    /// Maximum number of ledger accounts kept in memory.
    #[serde(default = "default_session_capacity")]
    pub session_capacity: usize,

    /// Directory evicted ledger accounts are written to.
    #[serde(default)]
    pub ledger_dir: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            repair: true,
            estimate_missing_costs: false,
            session_capacity: default_session_capacity(),
            ledger_dir: None,
        }
    }
}

pub const DEFAULT_COST_ESTIMATE: i64 = 10;

fn default_timeout_minutes() -> i64 {
    10
}

fn default_retry_max() -> i64 {
    2
}

fn default_timeout_seconds() -> i64 {
    30
}

fn default_session_capacity() -> usize {
    100
}

fn default_true() -> bool {
    true
}
