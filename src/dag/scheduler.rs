use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::task_info::TaskId;
use crate::errors::{HiveError, Result};
use crate::types::TaskStatus;

/// Static batch plan for a graph.
///
/// Each batch holds tasks whose dependencies all sit in strictly earlier
/// batches, so every task inside one batch may run in parallel. Batches keep
/// the input order of the tasks.
///
/// Fails with [`HiveError::DagCycle`] if a batch cannot be formed while tasks
/// remain. Graphs built through validation never hit that path.
pub fn execution_order(graph: &TaskGraph) -> Result<Vec<Vec<TaskId>>> {
    let mut remaining: Vec<&str> = graph.task_ids().collect();
    let mut unscheduled: HashSet<&str> = remaining.iter().copied().collect();
    let mut batches: Vec<Vec<TaskId>> = Vec::new();

    while !remaining.is_empty() {
        let (batch, rest): (Vec<&str>, Vec<&str>) =
            std::mem::take(&mut remaining).into_iter().partition(|id| {
            graph
                .dependencies_of(id)
                .iter()
                .all(|dep| !unscheduled.contains(dep.as_str()))
        });

        if batch.is_empty() {
            return Err(HiveError::DagCycle(format!(
                "no schedulable task among {}",
                rest.join(", ")
            )));
        }

        for id in &batch {
            unscheduled.remove(id);
        }
        debug!(batch = ?batch, "scheduler: formed batch");
        batches.push(batch.into_iter().map(str::to_string).collect());
        remaining = rest;
    }

    Ok(batches)
}

/// Runtime readiness query by full re-scan: tasks that are `Pending` and
/// whose dependencies are all `Completed`.
pub fn ready_set(graph: &TaskGraph) -> Vec<TaskId> {
    graph
        .tasks()
        .iter()
        .filter(|task| task.status == TaskStatus::Pending)
        .filter(|task| {
            task.depends_on.iter().all(|dep| {
                graph
                    .task_by_id(dep)
                    .is_some_and(|d| d.status == TaskStatus::Completed)
            })
        })
        .map(|task| task.id.clone())
        .collect()
}

/// Incremental readiness tracker.
///
/// Keeps, per task, the number of dependencies that have not completed yet.
/// [`Scheduler::on_completed`] decrements the counters of direct dependents,
/// which makes "are my dependencies done" an O(1) lookup. Status is still read
/// from the graph because retries move tasks back to `Pending`.
#[derive(Debug, Clone)]
pub struct Scheduler {
    outstanding: HashMap<TaskId, usize>,
}

impl Scheduler {
    pub fn new(graph: &TaskGraph) -> Self {
        let outstanding = graph
            .tasks()
            .iter()
            .map(|task| {
                let open = task
                    .depends_on
                    .iter()
                    .filter(|dep| {
                        graph
                            .task_by_id(dep)
                            .is_none_or(|d| d.status != TaskStatus::Completed)
                    })
                    .count();
                (task.id.clone(), open)
            })
            .collect();

        Self { outstanding }
    }

    /// Number of dependencies of `id` that have not completed, or `None` for
    /// an unknown task.
    pub fn outstanding_deps(&self, id: &str) -> Option<usize> {
        self.outstanding.get(id).copied()
    }

    /// Ready tasks in graph order.
    pub fn ready(&self, graph: &TaskGraph) -> Vec<TaskId> {
        graph
            .tasks()
            .iter()
            .filter(|task| {
                task.status == TaskStatus::Pending
                    && self.outstanding.get(&task.id).copied() == Some(0)
            })
            .map(|task| task.id.clone())
            .collect()
    }

    /// Record that `id` completed. Must be called exactly once per task.
    pub fn on_completed(&mut self, graph: &TaskGraph, id: &str) {
        for dependent in graph.dependents_of(id) {
            match self.outstanding.get_mut(dependent) {
                Some(open) if *open > 0 => *open -= 1,
                Some(_) => warn!(
                    task = %dependent,
                    dep = %id,
                    "dependency counter already at zero"
                ),
                None => warn!(task = %dependent, "dependent missing from scheduler"),
            }
        }
    }
}
