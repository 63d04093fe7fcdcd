// src/config/repair.rs

//! One-shot automatic repair of a rejected graph spec.
//!
//! The repair pass only fixes problems a generator commonly gets wrong:
//!
//! - blank or duplicate ids are regenerated as `task-<8 hex>`
//! - dependency references to unknown ids are dropped
//! - cost estimates are scaled down to fit 90% of the budget
//! - out-of-range per-task numbers are clamped
//!
//! Goal, budget and cycles are left alone; a spec with those problems stays
//! rejected after re-validation.

use std::collections::HashSet;

use tracing::warn;
use uuid::Uuid;

use crate::config::model::GraphSpec;

/// Rescaled estimates are fitted into this share (in percent) of the budget.
const RESCALE_TARGET_PERCENT: i128 = 90;

const MIN_TIMEOUT_SECONDS: i64 = 10;

/// Apply the repair pass in place. Returns a note for every change made.
pub fn repair(spec: &mut GraphSpec) -> Vec<String> {
    let mut notes = Vec::new();

    regenerate_ids(spec, &mut notes);
    drop_dangling_dependencies(spec, &mut notes);
    rescale_costs(spec, &mut notes);
    clamp_fields(spec, &mut notes);

    for note in &notes {
        warn!(repair = %note, "graph repaired");
    }
    notes
}

fn fresh_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("task-{}", &hex[..8])
}

fn regenerate_ids(spec: &mut GraphSpec, notes: &mut Vec<String>) {
    let mut seen: HashSet<String> = HashSet::new();

    for (index, task) in spec.subtasks.iter_mut().enumerate() {
        let blank = task.id.trim().is_empty();
        if blank || seen.contains(&task.id) {
            let mut id = fresh_id();
            while seen.contains(&id) {
                id = fresh_id();
            }
            if blank {
                notes.push(format!("subtask #{index}: generated id '{id}'"));
            } else {
                notes.push(format!(
                    "subtask #{index}: duplicate id '{}' renamed to '{id}'",
                    task.id
                ));
            }
            task.id = id;
        }
        seen.insert(task.id.clone());
    }
}

fn drop_dangling_dependencies(spec: &mut GraphSpec, notes: &mut Vec<String>) {
    let ids: HashSet<String> = spec.subtasks.iter().map(|t| t.id.clone()).collect();

    for task in &mut spec.subtasks {
        let before = task.after.len();
        let mut dropped = Vec::new();
        task.after.retain(|dep| {
            let keep = ids.contains(dep);
            if !keep {
                dropped.push(dep.clone());
            }
            keep
        });
        if task.after.len() != before {
            notes.push(format!(
                "task '{}': dropped unknown dependencies [{}]",
                task.id,
                dropped.join(", ")
            ));
        }
    }
}

fn rescale_costs(spec: &mut GraphSpec, notes: &mut Vec<String>) {
    let budget = spec.budget_credits;
    if budget <= 0 {
        return;
    }

    let estimate_missing = spec.config.estimate_missing_costs;
    let total: i64 = spec
        .subtasks
        .iter()
        .map(|t| t.effective_cost(estimate_missing).max(0))
        .fold(0i64, |acc, c| acc.saturating_add(c));

    if total <= budget {
        return;
    }

    for task in &mut spec.subtasks {
        let cost = i128::from(task.effective_cost(estimate_missing).max(0));
        let scaled =
            cost * i128::from(budget) * RESCALE_TARGET_PERCENT / (i128::from(total) * 100);
        task.cost_estimate = Some(i64::try_from(scaled).unwrap_or(i64::MAX).max(1));
    }
    notes.push(format!(
        "scaled cost estimates to {RESCALE_TARGET_PERCENT}% of budget \
         (total {total} exceeded budget {budget})"
    ));
}

fn clamp_fields(spec: &mut GraphSpec, notes: &mut Vec<String>) {
    for task in &mut spec.subtasks {
        if let Some(cost) = task.cost_estimate
            && cost < 1
        {
            task.cost_estimate = Some(1);
            notes.push(format!("task '{}': cost estimate {cost} raised to 1", task.id));
        }
        if task.retry_max < 0 {
            notes.push(format!(
                "task '{}': retry_max {} raised to 0",
                task.id, task.retry_max
            ));
            task.retry_max = 0;
        }
        if task.timeout_seconds < MIN_TIMEOUT_SECONDS {
            notes.push(format!(
                "task '{}': timeout {}s raised to {MIN_TIMEOUT_SECONDS}s",
                task.id, task.timeout_seconds
            ));
            task.timeout_seconds = MIN_TIMEOUT_SECONDS;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::TaskRecord;

    fn spec(budget: i64, subtasks: Vec<TaskRecord>) -> GraphSpec {
        GraphSpec {
            goal: "g".into(),
            budget_credits: budget,
            timeout_minutes: 10,
            subtasks,
            config: Default::default(),
        }
    }

    #[test]
    fn duplicate_and_blank_ids_are_regenerated() {
        let mut s = spec(
            100,
            vec![
                TaskRecord::new("a", "travel", "x"),
                TaskRecord::new("a", "travel", "y"),
                TaskRecord::new("", "travel", "z"),
            ],
        );
        let notes = repair(&mut s);

        assert_eq!(s.subtasks[0].id, "a");
        assert!(s.subtasks[1].id.starts_with("task-"));
        assert_eq!(s.subtasks[1].id.len(), "task-".len() + 8);
        assert!(s.subtasks[2].id.starts_with("task-"));
        assert_ne!(s.subtasks[1].id, s.subtasks[2].id);
        assert_eq!(notes.len(), 2);
    }

    #[test]
    fn costs_are_scaled_into_ninety_percent_of_budget() {
        let mut a = TaskRecord::new("a", "travel", "x");
        a.cost_estimate = Some(60);
        let mut b = TaskRecord::new("b", "travel", "y");
        b.cost_estimate = Some(60);
        let mut s = spec(100, vec![a, b]);

        repair(&mut s);

        let total: i64 = s.subtasks.iter().filter_map(|t| t.cost_estimate).sum();
        assert!(total <= 90, "total {total}");
        assert_eq!(s.subtasks[0].cost_estimate, Some(45));
    }

    #[test]
    fn clean_spec_needs_no_repair() {
        let mut s = spec(100, vec![TaskRecord::new("a", "travel", "x")]);
        assert!(repair(&mut s).is_empty());
    }
}
