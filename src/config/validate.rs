// src/config/validate.rs

//! Structural and budget validation of candidate task graphs.
//!
//! Validation runs in stages and stops after the first stage that reports an
//! error. Within a stage every independent problem is reported, so a caller
//! gets the full list for that stage in one pass:
//!
//! 1. graph-level fields (goal, budget, at least one task)
//! 2. per-task fields (ids, agent, kind, cost, retries, timeout)
//! 3. dependency references
//! 4. cycle detection
//! 5. budget feasibility (plus a warning when the plan is tight)

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::debug;

use crate::config::model::GraphSpec;
use crate::dag::TaskGraph;
use crate::dag::task_info::Task;
use crate::errors::{HiveError, Result};

/// Coarse classification used by callers that only care about the kind of
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Structural,
    Cycle,
    Budget,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("goal cannot be empty")]
    EmptyGoal,

    #[error("budget must be positive (got {0})")]
    NonPositiveBudget(i64),

    #[error("at least one subtask is required")]
    NoTasks,

    #[error("subtask #{index}: id cannot be empty")]
    EmptyTaskId { index: usize },

    #[error("duplicate task id '{0}'")]
    DuplicateTaskId(String),

    #[error("task '{task}': agent cannot be empty")]
    EmptyAgent { task: String },

    #[error("task '{task}': task kind cannot be empty")]
    EmptyKind { task: String },

    #[error("task '{task}': cost estimate must be positive (got {cost})")]
    NonPositiveCost { task: String, cost: i64 },

    #[error("task '{task}': retry_max cannot be negative (got {retry_max})")]
    NegativeRetryMax { task: String, retry_max: i64 },

    #[error("task '{task}': timeout must be positive (got {timeout_seconds}s)")]
    NonPositiveTimeout { task: String, timeout_seconds: i64 },

    #[error("task '{task}' has unknown dependency '{dependency}' in `after`")]
    UnknownDependency { task: String, dependency: String },

    /// Each arrow reads "depends on".
    #[error("cycle detected in task graph: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("estimated cost ({estimated}) exceeds budget ({budget})")]
    OverBudget { estimated: i64, budget: i64 },
}

impl ValidationError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ValidationError::Cycle { .. } => ErrorCategory::Cycle,
            ValidationError::OverBudget { .. } => ErrorCategory::Budget,
            _ => ErrorCategory::Structural,
        }
    }
}

/// Outcome of [`Validator::validate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn count(&self, category: ErrorCategory) -> usize {
        self.errors
            .iter()
            .filter(|e| e.category() == category)
            .count()
    }
}

/// Stateless validator; [`Validator::validate`] never mutates its input.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    /// Utilisation (in percent of the budget) above which a warning is emitted.
    tight_budget_percent: i64,
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            tight_budget_percent: 90,
        }
    }
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tight_budget_percent(mut self, percent: i64) -> Self {
        self.tight_budget_percent = percent;
        self
    }

    pub fn validate(&self, spec: &GraphSpec) -> ValidationReport {
        let mut report = ValidationReport::default();

        let stages: [fn(&GraphSpec, &mut ValidationReport); 4] = [
            check_graph_fields,
            check_task_fields,
            check_dependency_refs,
            check_cycles,
        ];

        for stage in stages {
            stage(spec, &mut report);
            if !report.is_ok() {
                debug!(errors = report.errors.len(), "validation stopped early");
                return report;
            }
        }

        self.check_budget(spec, &mut report);
        report
    }

    /// Validate and, if accepted, build the runtime graph.
    pub fn build(&self, spec: &GraphSpec) -> Result<(TaskGraph, ValidationReport)> {
        let report = self.validate(spec);
        if !report.is_ok() {
            return Err(HiveError::InvalidGraph(report.errors));
        }
        Ok((graph_from_spec(spec), report))
    }

    fn check_budget(&self, spec: &GraphSpec, report: &mut ValidationReport) {
        let estimated = estimated_total(spec);
        let budget = spec.budget_credits;

        if estimated > budget {
            report
                .errors
                .push(ValidationError::OverBudget { estimated, budget });
            return;
        }

        if estimated.saturating_mul(100) > budget.saturating_mul(self.tight_budget_percent) {
            report.warnings.push(format!(
                "budget is very tight: estimated cost {estimated} of {budget} credits \
                 leaves little room for retries"
            ));
        }
    }
}

impl TryFrom<GraphSpec> for TaskGraph {
    type Error = HiveError;

    fn try_from(spec: GraphSpec) -> std::result::Result<Self, Self::Error> {
        Validator::default().build(&spec).map(|(graph, _)| graph)
    }
}

/// Sum of effective cost estimates over all subtasks.
pub fn estimated_total(spec: &GraphSpec) -> i64 {
    spec.subtasks
        .iter()
        .map(|t| t.effective_cost(spec.config.estimate_missing_costs))
        .fold(0i64, |acc, c| acc.saturating_add(c))
}

fn check_graph_fields(spec: &GraphSpec, report: &mut ValidationReport) {
    if spec.goal.trim().is_empty() {
        report.errors.push(ValidationError::EmptyGoal);
    }
    if spec.budget_credits <= 0 {
        report
            .errors
            .push(ValidationError::NonPositiveBudget(spec.budget_credits));
    }
    if spec.subtasks.is_empty() {
        report.errors.push(ValidationError::NoTasks);
    }
}

fn check_task_fields(spec: &GraphSpec, report: &mut ValidationReport) {
    let mut seen: HashSet<&str> = HashSet::new();
    let estimate_missing = spec.config.estimate_missing_costs;

    for (index, task) in spec.subtasks.iter().enumerate() {
        let label = if task.id.trim().is_empty() {
            report.errors.push(ValidationError::EmptyTaskId { index });
            format!("#{index}")
        } else {
            if !seen.insert(task.id.as_str()) {
                report
                    .errors
                    .push(ValidationError::DuplicateTaskId(task.id.clone()));
            }
            task.id.clone()
        };

        if task.agent.trim().is_empty() {
            report.errors.push(ValidationError::EmptyAgent {
                task: label.clone(),
            });
        }
        if task.task.trim().is_empty() {
            report.errors.push(ValidationError::EmptyKind {
                task: label.clone(),
            });
        }

        let cost = task.effective_cost(estimate_missing);
        if cost <= 0 {
            report.errors.push(ValidationError::NonPositiveCost {
                task: label.clone(),
                cost,
            });
        }
        if task.retry_max < 0 {
            report.errors.push(ValidationError::NegativeRetryMax {
                task: label.clone(),
                retry_max: task.retry_max,
            });
        }
        if task.timeout_seconds <= 0 {
            report.errors.push(ValidationError::NonPositiveTimeout {
                task: label,
                timeout_seconds: task.timeout_seconds,
            });
        }
    }
}

fn check_dependency_refs(spec: &GraphSpec, report: &mut ValidationReport) {
    let ids: HashSet<&str> = spec.subtasks.iter().map(|t| t.id.as_str()).collect();

    for task in &spec.subtasks {
        for dep in &task.after {
            if !ids.contains(dep.as_str()) {
                report.errors.push(ValidationError::UnknownDependency {
                    task: task.id.clone(),
                    dependency: dep.clone(),
                });
            }
        }
    }
}

fn check_cycles(spec: &GraphSpec, report: &mut ValidationReport) {
    if let Some(path) = find_cycle(spec) {
        report.errors.push(ValidationError::Cycle { path });
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    Unvisited,
    InProgress,
    Done,
}

/// Three-colour depth-first search over the "depends on" relation.
///
/// Iterative, so deep chains cannot overflow the stack; every node and edge is
/// visited at most once. Returns the first cycle found as a closed path
/// (first and last element are the same id).
fn find_cycle(spec: &GraphSpec) -> Option<Vec<String>> {
    let index: HashMap<&str, usize> = spec
        .subtasks
        .iter()
        .enumerate()
        .map(|(i, t)| (t.id.as_str(), i))
        .collect();

    let adjacency: Vec<Vec<usize>> = spec
        .subtasks
        .iter()
        .map(|t| {
            t.after
                .iter()
                .filter_map(|dep| index.get(dep.as_str()).copied())
                .collect()
        })
        .collect();

    let mut color = vec![Color::Unvisited; adjacency.len()];

    for root in 0..adjacency.len() {
        if color[root] != Color::Unvisited {
            continue;
        }

        // (node, position of the next edge to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        color[root] = Color::InProgress;

        while let Some(top) = stack.last_mut() {
            let (node, edge) = *top;
            if let Some(&dep) = adjacency[node].get(edge) {
                top.1 += 1;
                match color[dep] {
                    Color::Unvisited => {
                        color[dep] = Color::InProgress;
                        stack.push((dep, 0));
                    }
                    Color::InProgress => {
                        let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                        let mut path: Vec<String> = stack[start..]
                            .iter()
                            .map(|&(n, _)| spec.subtasks[n].id.clone())
                            .collect();
                        path.push(spec.subtasks[dep].id.clone());
                        return Some(path);
                    }
                    Color::Done => {}
                }
            } else {
                color[node] = Color::Done;
                stack.pop();
            }
        }
    }

    None
}

/// Convert an accepted spec into the runtime graph. Assumes validation passed.
fn graph_from_spec(spec: &GraphSpec) -> TaskGraph {
    let estimate_missing = spec.config.estimate_missing_costs;

    let tasks = spec
        .subtasks
        .iter()
        .map(|record| {
            let mut deps: Vec<String> = Vec::with_capacity(record.after.len());
            for dep in &record.after {
                if !deps.contains(dep) {
                    deps.push(dep.clone());
                }
            }

            Task::new(
                record.id.clone(),
                record.agent.clone(),
                record.task.clone(),
                record.params.clone(),
                deps,
                record.effective_cost(estimate_missing) as u64,
                u32::try_from(record.retry_max).unwrap_or(u32::MAX),
                record.timeout_seconds as u64,
            )
        })
        .collect();

    TaskGraph::new_unchecked(
        spec.goal.clone(),
        spec.budget_credits as u64,
        spec.timeout_minutes.max(0) as u64,
        tasks,
    )
}
