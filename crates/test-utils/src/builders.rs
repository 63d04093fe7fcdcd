#![allow(dead_code)]

use serde_json::Value;
use taskhive::config::{GraphSpec, RunConfig, TaskRecord};
use taskhive::dag::TaskGraph;

/// Builder for `GraphSpec` to simplify test setup.
pub struct GraphSpecBuilder {
    spec: GraphSpec,
}

impl GraphSpecBuilder {
    pub fn new(goal: &str, budget_credits: i64) -> Self {
        Self {
            spec: GraphSpec {
                goal: goal.to_string(),
                budget_credits,
                timeout_minutes: 10,
                subtasks: Vec::new(),
                config: RunConfig::default(),
            },
        }
    }

    pub fn with_task(mut self, task: TaskRecord) -> Self {
        self.spec.subtasks.push(task);
        self
    }

    pub fn timeout_minutes(mut self, minutes: i64) -> Self {
        self.spec.timeout_minutes = minutes;
        self
    }

    pub fn estimate_missing_costs(mut self, val: bool) -> Self {
        self.spec.config.estimate_missing_costs = val;
        self
    }

    pub fn repair(mut self, val: bool) -> Self {
        self.spec.config.repair = val;
        self
    }

    /// The raw spec, unvalidated.
    pub fn spec(self) -> GraphSpec {
        self.spec
    }

    /// Validate and build the runtime graph; panics on an invalid spec.
    pub fn build(self) -> TaskGraph {
        TaskGraph::try_from(self.spec).expect("Failed to build valid graph from builder")
    }
}

/// Builder for `TaskRecord`.
pub struct TaskRecordBuilder {
    task: TaskRecord,
}

impl TaskRecordBuilder {
    pub fn new(id: &str, agent: &str, kind: &str) -> Self {
        Self {
            task: TaskRecord::new(id, agent, kind),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn cost(mut self, cost: i64) -> Self {
        self.task.cost_estimate = Some(cost);
        self
    }

    pub fn retry_max(mut self, retries: i64) -> Self {
        self.task.retry_max = retries;
        self
    }

    pub fn timeout_seconds(mut self, secs: i64) -> Self {
        self.task.timeout_seconds = secs;
        self
    }

    pub fn param(mut self, key: &str, value: Value) -> Self {
        self.task.params.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> TaskRecord {
        self.task
    }
}
