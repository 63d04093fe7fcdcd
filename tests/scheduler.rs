// tests/scheduler.rs

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use taskhive::config::GraphSpec;
use taskhive::dag::{Scheduler, StateManager, TaskGraph, execution_order, ready_set};
use taskhive::types::TaskStatus;
use taskhive_test_utils::builders::{GraphSpecBuilder, TaskRecordBuilder};

fn diamond() -> TaskGraph {
    GraphSpecBuilder::new("diamond", 100)
        .with_task(TaskRecordBuilder::new("research", "travel", "research_destination").cost(5).build())
        .with_task(
            TaskRecordBuilder::new("flights", "travel", "find_flights")
                .after("research")
                .cost(5)
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("hotels", "travel", "find_hotels")
                .after("research")
                .cost(5)
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("compile", "compiler", "compile_results")
                .after("flights")
                .after("hotels")
                .cost(5)
                .build(),
        )
        .build()
}

#[test]
fn simple_chain_batches() {
    let graph = GraphSpecBuilder::new("trip", 100)
        .with_task(TaskRecordBuilder::new("research", "travel", "research_destination").cost(20).build())
        .with_task(
            TaskRecordBuilder::new("flights", "travel", "find_flights")
                .after("research")
                .cost(30)
                .build(),
        )
        .build();

    let batches = execution_order(&graph).unwrap();
    assert_eq!(batches, vec![vec!["research".to_string()], vec!["flights".to_string()]]);
}

#[test]
fn diamond_batches_keep_input_order() {
    let batches = execution_order(&diamond()).unwrap();
    assert_eq!(
        batches,
        vec![
            vec!["research".to_string()],
            vec!["flights".to_string(), "hotels".to_string()],
            vec!["compile".to_string()],
        ]
    );
}

#[test]
fn incremental_readiness_matches_rescan() {
    let mut graph = diamond();
    let mut scheduler = Scheduler::new(&graph);

    assert_eq!(scheduler.ready(&graph), ready_set(&graph));
    assert_eq!(scheduler.ready(&graph), vec!["research".to_string()]);
    assert_eq!(scheduler.outstanding_deps("compile"), Some(2));

    for id in ["research", "flights"] {
        let mut states = StateManager::new(&mut graph);
        states.mark_ready(id);
        states.mark_in_progress(id, 5);
        states.complete(id, serde_json::json!({}));
        scheduler.on_completed(&graph, id);
    }

    assert_eq!(scheduler.outstanding_deps("compile"), Some(1));
    assert_eq!(scheduler.ready(&graph), vec!["hotels".to_string()]);
    assert_eq!(scheduler.ready(&graph), ready_set(&graph));
}

#[test]
fn failure_skips_transitive_dependents_once() {
    let mut graph = diamond();
    let mut states = StateManager::new(&mut graph);
    states.mark_ready("research");
    states.mark_in_progress("research", 5);

    let step = states.fail("research", "boom");
    assert_eq!(step.failed.as_deref(), Some("research"));
    assert_eq!(step.skipped, vec!["flights", "hotels", "compile"]);

    for id in ["flights", "hotels", "compile"] {
        assert_eq!(graph.task_by_id(id).unwrap().status, TaskStatus::Skipped);
    }
    assert!(graph.all_terminal());
}

// Acyclic by construction: task N may only depend on tasks 0..N.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = GraphSpec> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(move |raw_deps| {
            let mut builder = GraphSpecBuilder::new("generated", 10_000);
            for (i, candidates) in raw_deps.into_iter().enumerate() {
                let mut task = TaskRecordBuilder::new(&format!("task_{i}"), "travel", "x").cost(1);
                if i > 0 {
                    let deps: HashSet<usize> = candidates.into_iter().map(|d| d % i).collect();
                    for dep in deps {
                        task = task.after(&format!("task_{dep}"));
                    }
                }
                builder = builder.with_task(task.build());
            }
            builder.spec()
        })
    })
}

proptest! {
    #[test]
    fn batches_cover_every_task_once_after_dependencies(spec in dag_strategy(12)) {
        let graph = TaskGraph::try_from(spec).unwrap();
        let batches = execution_order(&graph).unwrap();

        let mut batch_of: HashMap<&str, usize> = HashMap::new();
        for (i, batch) in batches.iter().enumerate() {
            prop_assert!(!batch.is_empty());
            for id in batch {
                prop_assert!(batch_of.insert(id.as_str(), i).is_none(), "{} scheduled twice", id);
            }
        }
        prop_assert_eq!(batch_of.len(), graph.len());

        for task in graph.tasks() {
            let mine = batch_of[task.id.as_str()];
            for dep in &task.depends_on {
                prop_assert!(batch_of[dep.as_str()] < mine, "{} not before {}", dep, task.id);
            }
        }
    }

    #[test]
    fn reversed_edge_is_always_a_cycle(spec in dag_strategy(8)) {
        // Close a loop along an existing edge.
        let Some((child, parent)) = spec
            .subtasks
            .iter()
            .find_map(|t| t.after.first().map(|p| (t.id.clone(), p.clone())))
        else {
            return Ok(());
        };

        let mut spec = spec;
        if let Some(record) = spec.subtasks.iter_mut().find(|t| t.id == parent) {
            record.after.push(child);
        }
        let report = taskhive::config::Validator::default().validate(&spec);
        prop_assert_eq!(report.errors.len(), 1);
        prop_assert!(matches!(report.errors[0], taskhive::config::ValidationError::Cycle { .. }), "expected a Cycle error");
    }
}
