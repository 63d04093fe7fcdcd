// src/dag/graph.rs

use std::collections::HashMap;

use crate::dag::task_info::{Task, TaskId};
use crate::types::GraphStatus;

/// One workflow instance: goal, budget, and the tasks in input order.
///
/// Built from a validated spec (see `config::validate`), so every dependency
/// id resolves and the relation is acyclic. Besides the tasks themselves we
/// keep reverse adjacency for dependent lookups during cascades.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    pub goal: String,
    pub budget_credits: u64,
    pub timeout_minutes: u64,
    pub total_cost: u64,
    pub status: GraphStatus,

    tasks: Vec<Task>,
    index: HashMap<TaskId, usize>,
    /// Direct dependents per task, in input order.
    dependents: Vec<Vec<TaskId>>,
}

impl TaskGraph {
    /// Build a graph without validating it.
    ///
    /// Dependencies that do not name a task in `tasks` are ignored by the
    /// dependent index but kept on the task itself.
    pub fn new_unchecked(
        goal: String,
        budget_credits: u64,
        timeout_minutes: u64,
        tasks: Vec<Task>,
    ) -> Self {
        let index: HashMap<TaskId, usize> = tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (t.id.clone(), i))
            .collect();

        let mut dependents: Vec<Vec<TaskId>> = vec![Vec::new(); tasks.len()];
        for task in &tasks {
            for dep in &task.depends_on {
                if let Some(&i) = index.get(dep) {
                    dependents[i].push(task.id.clone());
                }
            }
        }

        Self {
            goal,
            budget_credits,
            timeout_minutes,
            total_cost: 0,
            status: GraphStatus::Pending,
            tasks,
            index,
            dependents,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.tasks.iter().map(|t| t.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.index.get(id).map(|&i| &self.tasks[i])
    }

    pub(crate) fn task_by_id_mut(&mut self, id: &str) -> Option<&mut Task> {
        match self.index.get(id) {
            Some(&i) => Some(&mut self.tasks[i]),
            None => None,
        }
    }

    /// Immediate dependencies of a task (the ids in its `after`).
    pub fn dependencies_of(&self, id: &str) -> &[TaskId] {
        self.task_by_id(id)
            .map(|t| t.depends_on.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list it in their `after`).
    pub fn dependents_of(&self, id: &str) -> &[TaskId] {
        self.index
            .get(id)
            .map(|&i| self.dependents[i].as_slice())
            .unwrap_or(&[])
    }

    /// Sum of cost estimates; the pre-flight figure checked against the budget.
    pub fn estimated_cost(&self) -> u64 {
        self.tasks.iter().map(|t| t.cost_estimate).sum()
    }

    pub fn all_terminal(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_terminal())
    }
}
