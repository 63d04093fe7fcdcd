// src/dag/state_manager.rs

//! Task state transitions.
//!
//! ```text
//! PENDING -> READY -> IN_PROGRESS -> COMPLETED
//!                                 -> PENDING   (retry)
//!                                 -> FAILED    -> dependents SKIPPED
//! ```

use std::collections::{HashSet, VecDeque};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::dag::graph::TaskGraph;
use crate::dag::scheduler_step::{ExpireStep, OutcomeStep};
use crate::dag::task_info::TaskId;
use crate::types::TaskStatus;

/// Applies state transitions to the tasks of one graph.
pub struct StateManager<'a> {
    graph: &'a mut TaskGraph,
}

impl<'a> StateManager<'a> {
    pub fn new(graph: &'a mut TaskGraph) -> Self {
        Self { graph }
    }

    /// `Pending` -> `Ready`. Returns `false` if the task was not pending.
    pub fn mark_ready(&mut self, id: &str) -> bool {
        self.transition(id, &[TaskStatus::Pending], TaskStatus::Ready)
    }

    /// `Ready` -> `Pending`, used when a ready task cannot be afforded yet.
    pub fn mark_waiting(&mut self, id: &str) -> bool {
        self.transition(id, &[TaskStatus::Ready], TaskStatus::Pending)
    }

    /// `Ready` -> `InProgress`, recording the credits charged for the attempt.
    pub fn mark_in_progress(&mut self, id: &str, charged: u64) -> bool {
        if !self.transition(id, &[TaskStatus::Ready], TaskStatus::InProgress) {
            return false;
        }
        if let Some(task) = self.graph.task_by_id_mut(id) {
            task.actual_cost += charged;
        }
        self.graph.total_cost += charged;
        true
    }

    /// `InProgress` -> `Completed`.
    pub fn complete(&mut self, id: &str, output: Value) -> OutcomeStep {
        let mut step = OutcomeStep::default();
        if let Some(task) = self.graph.task_by_id_mut(id) {
            task.status = TaskStatus::Completed;
            task.result = Some(output);
            task.error_message = None;
            debug!(task = %id, actual_cost = task.actual_cost, "task completed");
            step.completed = Some(id.to_string());
        }
        step
    }

    /// `InProgress` -> `Pending` for another attempt.
    pub fn schedule_retry(&mut self, id: &str, error: &str) -> OutcomeStep {
        let mut step = OutcomeStep::default();
        if let Some(task) = self.graph.task_by_id_mut(id) {
            task.retry_count += 1;
            task.status = TaskStatus::Pending;
            task.error_message = Some(error.to_string());
            info!(
                task = %id,
                retry = task.retry_count,
                retry_max = task.retry_max,
                error = %error,
                "task failed; scheduling retry"
            );
            step.retried = Some(id.to_string());
        }
        step
    }

    /// Mark the task `Failed` and skip everything downstream of it.
    pub fn fail(&mut self, id: &str, error: &str) -> OutcomeStep {
        let mut step = OutcomeStep::default();
        match self.graph.task_by_id_mut(id) {
            Some(task) => {
                task.status = TaskStatus::Failed;
                task.error_message = Some(error.to_string());
                warn!(
                    task = %id,
                    retries = task.retry_count,
                    error = %error,
                    "task failed; skipping dependents"
                );
            }
            None => {
                warn!(task = %id, "failure for unknown task; ignoring");
                return step;
            }
        }
        step.failed = Some(id.to_string());
        step.skipped = self.mark_dependents_skipped(id);
        step
    }

    /// Mark every transitive dependent of `failed_task` that is still
    /// `Pending` or `Ready` as `Skipped`.
    ///
    /// Worklist traversal with an explicit visited set: each dependent is
    /// visited once however many paths lead to it.
    pub fn mark_dependents_skipped(&mut self, failed_task: &str) -> Vec<TaskId> {
        let mut queue: VecDeque<TaskId> =
            self.graph.dependents_of(failed_task).iter().cloned().collect();
        let mut visited: HashSet<TaskId> = queue.iter().cloned().collect();
        let mut skipped = Vec::new();

        while let Some(name) = queue.pop_front() {
            if let Some(task) = self.graph.task_by_id_mut(&name) {
                if matches!(task.status, TaskStatus::Pending | TaskStatus::Ready) {
                    task.status = TaskStatus::Skipped;
                    task.error_message = Some(format!("skipped: dependency '{failed_task}' failed"));
                    debug!(task = %name, upstream = %failed_task, "marking dependent Skipped");
                    skipped.push(name.clone());
                }
            }

            for next in self.graph.dependents_of(&name) {
                if visited.insert(next.clone()) {
                    queue.push_back(next.clone());
                }
            }
        }

        skipped
    }

    /// Fail every non-terminal task with `reason` and skip their dependents.
    ///
    /// Used when the run deadline passes or a shutdown is requested.
    pub fn expire_non_terminal(&mut self, reason: &str) -> ExpireStep {
        let mut step = ExpireStep::default();

        let open: Vec<TaskId> = self
            .graph
            .tasks()
            .iter()
            .filter(|t| !t.status.is_terminal())
            .map(|t| t.id.clone())
            .collect();

        for id in open {
            // An earlier iteration may already have skipped this one.
            let still_open = self
                .graph
                .task_by_id(&id)
                .is_some_and(|t| !t.status.is_terminal());
            if !still_open {
                continue;
            }

            let outcome = self.fail(&id, reason);
            step.failed.extend(outcome.failed);
            step.skipped.extend(outcome.skipped);
        }

        step
    }

    pub fn all_terminal(&self) -> bool {
        self.graph.all_terminal()
    }

    fn transition(&mut self, id: &str, from: &[TaskStatus], to: TaskStatus) -> bool {
        match self.graph.task_by_id_mut(id) {
            Some(task) if from.contains(&task.status) => {
                task.status = to;
                true
            }
            Some(task) => {
                warn!(
                    task = %id,
                    status = %task.status,
                    wanted = %to,
                    "illegal task transition; ignoring"
                );
                false
            }
            None => {
                warn!(task = %id, "transition for unknown task; ignoring");
                false
            }
        }
    }
}
