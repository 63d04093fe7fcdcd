// tests/executor.rs

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;

use taskhive::config::accept_spec;
use taskhive::dag::{Params, TaskGraph};
use taskhive::engine::{
    CoreCommand, CoreRuntime, CoreStep, Runtime, RuntimeEvent, RuntimeOptions, TaskOutcome,
};
use taskhive::exec::{RegistryBackend, WorkerRegistry};
use taskhive::execute_graph;
use taskhive::ledger::Ledger;
use taskhive::types::{GraphStatus, TaskStatus};
use taskhive_test_utils::builders::{GraphSpecBuilder, TaskRecordBuilder};
use taskhive_test_utils::{init_tracing, run_with_fake};

/// research (20) -> flights (30), budget 100.
fn trip_graph() -> TaskGraph {
    GraphSpecBuilder::new("Plan a 5-day trip to Paris", 100)
        .with_task(
            TaskRecordBuilder::new("research", "travel", "research_destination")
                .cost(20)
                .param("destination", json!("Paris"))
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("flights", "travel", "find_flights")
                .after("research")
                .cost(30)
                .retry_max(3)
                .param("destination", json!("Paris"))
                .build(),
        )
        .build()
}

/// (id, attempt, cost) of every attempt the step dispatches.
fn dispatched(step: &CoreStep) -> Vec<(String, u32, u64)> {
    step.commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::DispatchTasks(tasks) => Some(tasks),
            CoreCommand::AwaitInFlight { .. } => None,
        })
        .flatten()
        .map(|t| (t.id.clone(), t.attempt, t.cost))
        .collect()
}

fn finished(task: &str, attempt: u32, outcome: TaskOutcome) -> RuntimeEvent {
    RuntimeEvent::TaskFinished {
        task: task.to_string(),
        attempt,
        outcome,
    }
}

fn ok() -> TaskOutcome {
    TaskOutcome::Success(json!({ "ok": true }))
}

fn failed(msg: &str) -> TaskOutcome {
    TaskOutcome::Failed(msg.to_string())
}

#[test]
fn retry_denied_when_next_attempt_is_unaffordable() {
    init_tracing();
    let ledger = Arc::new(Ledger::default());
    let mut core = CoreRuntime::new(trip_graph(), Arc::clone(&ledger), "trip").unwrap();

    let step = core.start();
    assert_eq!(dispatched(&step), vec![("research".to_string(), 0, 20)]);
    assert!(step.keep_running);

    let step = core.step(finished("research", 0, ok()));
    assert_eq!(dispatched(&step), vec![("flights".to_string(), 0, 30)]);

    let step = core.step(finished("flights", 0, failed("api down")));
    assert_eq!(dispatched(&step), vec![("flights".to_string(), 1, 45)]);

    // Retry 2 would cost floor(30 * 1.5^2) = 67 with only 5 credits left.
    let step = core.step(finished("flights", 1, failed("api down")));
    assert!(dispatched(&step).is_empty());
    assert!(!step.keep_running);

    let summary = core.summary();
    assert_eq!(summary.status, GraphStatus::Completed);
    assert_eq!(summary.total_cost, 95);
    assert_eq!(ledger.balance("trip"), Some(5));

    let flights = summary.task("flights").unwrap();
    assert_eq!(flights.status, TaskStatus::Failed);
    assert_eq!(flights.actual_cost, 75);
    assert_eq!(flights.retry_count, 1);
    let message = flights.error_message.as_deref().unwrap();
    assert!(message.contains("retry 2 needs 67 credits, 5 left"), "{message}");

    let ledger_summary = summary.ledger_summary.as_ref().unwrap();
    assert_eq!(ledger_summary.total_spent, 95);
    assert_eq!(ledger_summary.spending_by_type.get("task_retry"), Some(&45));
}

#[test]
fn failure_cascades_to_transitive_dependents() {
    let graph = GraphSpecBuilder::new("chain", 100)
        .with_task(TaskRecordBuilder::new("a", "travel", "x").cost(10).retry_max(0).build())
        .with_task(TaskRecordBuilder::new("b", "travel", "x").after("a").cost(10).build())
        .with_task(TaskRecordBuilder::new("c", "travel", "x").after("b").cost(10).build())
        .build();
    let mut core = CoreRuntime::new(graph, Arc::new(Ledger::default()), "chain").unwrap();

    core.start();
    let step = core.step(finished("a", 0, failed("boom")));
    assert!(!step.keep_running);

    let summary = core.summary();
    assert_eq!(summary.status, GraphStatus::Completed);
    assert_eq!(summary.task("a").unwrap().status, TaskStatus::Failed);
    assert_eq!(summary.task("b").unwrap().status, TaskStatus::Skipped);
    assert_eq!(summary.task("c").unwrap().status, TaskStatus::Skipped);
    assert_eq!(summary.total_cost, 10);
}

#[test]
fn affordable_work_stalls_into_budget_exhausted() {
    let graph = GraphSpecBuilder::new("stall", 35)
        .with_task(TaskRecordBuilder::new("p", "travel", "x").cost(10).build())
        .with_task(TaskRecordBuilder::new("a", "travel", "x").cost(10).build())
        .with_task(TaskRecordBuilder::new("y", "travel", "x").after("p").cost(10).build())
        .build();
    let ledger = Arc::new(Ledger::default());
    let mut core = CoreRuntime::new(graph, Arc::clone(&ledger), "stall").unwrap();

    let step = core.start();
    assert_eq!(dispatched(&step).len(), 2);

    // The retry (15) takes the remaining balance.
    let step = core.step(finished("a", 0, failed("flaky")));
    assert_eq!(dispatched(&step), vec![("a".to_string(), 1, 15)]);
    assert_eq!(ledger.balance("stall"), Some(0));

    let step = core.step(finished("p", 0, ok()));
    assert!(dispatched(&step).is_empty());
    assert!(step.keep_running);

    let step = core.step(finished("a", 1, ok()));
    assert!(!step.keep_running);

    let summary = core.summary();
    assert_eq!(summary.status, GraphStatus::BudgetExhausted);
    assert_eq!(summary.stalled, vec!["y".to_string()]);
    assert_eq!(summary.task("y").unwrap().status, TaskStatus::Pending);
    assert_eq!(summary.total_cost, 35);
}

#[test]
fn stale_completions_are_ignored() {
    let mut core = CoreRuntime::new(trip_graph(), Arc::new(Ledger::default()), "stale").unwrap();
    core.start();

    for event in [
        finished("research", 3, ok()),
        finished("flights", 0, ok()),
        finished("ghost", 0, ok()),
    ] {
        let step = core.step(event);
        assert!(step.commands.is_empty());
        assert!(step.keep_running);
    }

    assert_eq!(core.in_flight(), 1);
    let summary = core.summary();
    assert_eq!(summary.task("research").unwrap().status, TaskStatus::InProgress);
    assert_eq!(summary.task("flights").unwrap().status, TaskStatus::Pending);
}

#[test]
fn failures_while_draining_are_not_retried() {
    let graph = GraphSpecBuilder::new("drain", 100)
        .with_task(TaskRecordBuilder::new("a", "travel", "x").cost(10).timeout_seconds(45).build())
        .with_task(TaskRecordBuilder::new("b", "travel", "x").after("a").cost(10).build())
        .build();
    let mut core = CoreRuntime::new(graph, Arc::new(Ledger::default()), "drain").unwrap();
    core.start();

    let step = core.step(RuntimeEvent::ShutdownRequested);
    assert!(core.is_draining());
    assert!(step.keep_running);
    assert!(matches!(
        step.commands[..],
        [CoreCommand::AwaitInFlight { grace }] if grace == Duration::from_secs(45)
    ));

    let step = core.step(finished("a", 0, failed("interrupted")));
    assert!(!step.keep_running);

    let summary = core.summary();
    assert_eq!(summary.status, GraphStatus::TimedOut);
    let a = summary.task("a").unwrap();
    assert_eq!(a.status, TaskStatus::Failed);
    assert_eq!(a.retry_count, 0);
    assert!(a.error_message.as_deref().unwrap().contains("not retried"));
    assert_eq!(summary.task("b").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn retry_then_success_through_runtime() {
    init_tracing();
    let ledger = Arc::new(Ledger::default());

    let run = timeout(
        Duration::from_secs(5),
        run_with_fake(trip_graph(), Arc::clone(&ledger), "retry", RuntimeOptions::default(), |b| {
            b.fail_times("flights", 1)
        }),
    )
    .await
    .expect("run finished");

    assert_eq!(run.dispatched_ids(), vec!["research", "flights", "flights"]);
    assert_eq!(run.dispatched[2].attempt, 1);
    assert_eq!(run.dispatched[2].cost, 45);

    let summary = run.summary;
    assert_eq!(summary.status, GraphStatus::Completed);
    assert_eq!(summary.count(TaskStatus::Completed), 2);
    let flights = summary.task("flights").unwrap();
    assert_eq!(flights.retry_count, 1);
    assert_eq!(flights.actual_cost, 75);
    assert_eq!(flights.result, Some(json!({ "task": "flights", "attempt": 1 })));
    assert_eq!(ledger.balance("retry"), Some(5));
}

#[tokio::test]
async fn independent_tasks_are_dispatched_together() {
    let graph = GraphSpecBuilder::new("fan-out", 100)
        .with_task(TaskRecordBuilder::new("flights", "travel", "find_flights").cost(10).build())
        .with_task(TaskRecordBuilder::new("hotels", "travel", "find_hotels").cost(10).build())
        .with_task(
            TaskRecordBuilder::new("compile", "compiler", "compile_results")
                .after("flights")
                .after("hotels")
                .cost(10)
                .build(),
        )
        .build();

    let run = run_with_fake(graph, Arc::new(Ledger::default()), "fan", RuntimeOptions::default(), |b| {
        b.delay("flights", Duration::from_millis(20))
    })
    .await;

    assert_eq!(run.dispatched_ids(), vec!["flights", "hotels", "compile"]);
    assert_eq!(run.summary.status, GraphStatus::Completed);
    assert_eq!(run.summary.total_cost, 30);
}

#[tokio::test(start_paused = true)]
async fn deadline_expires_hung_attempts_after_grace() {
    init_tracing();
    let graph = GraphSpecBuilder::new("deadline", 100)
        .with_task(TaskRecordBuilder::new("fast", "travel", "x").cost(10).build())
        .with_task(TaskRecordBuilder::new("slow", "travel", "x").cost(10).timeout_seconds(30).build())
        .with_task(TaskRecordBuilder::new("after_slow", "travel", "x").after("slow").cost(10).build())
        .build();

    let options = RuntimeOptions {
        run_timeout: Some(Duration::from_secs(60)),
    };
    let started = tokio::time::Instant::now();
    let run = run_with_fake(graph, Arc::new(Ledger::default()), "deadline", options, |b| {
        b.hang("slow")
    })
    .await;

    // 60s deadline plus the 30s grace of the longest in-flight attempt.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(90) && elapsed < Duration::from_secs(91),
        "{elapsed:?}"
    );

    let summary = run.summary;
    assert_eq!(summary.status, GraphStatus::TimedOut);
    assert_eq!(summary.task("fast").unwrap().status, TaskStatus::Completed);
    assert_eq!(summary.task("slow").unwrap().status, TaskStatus::Failed);
    assert_eq!(summary.task("after_slow").unwrap().status, TaskStatus::Skipped);
    assert_eq!(summary.total_cost, 20);
}

#[tokio::test(start_paused = true)]
async fn in_flight_attempt_may_finish_during_grace() {
    let graph = GraphSpecBuilder::new("grace", 100)
        .with_task(TaskRecordBuilder::new("slow", "travel", "x").cost(10).timeout_seconds(30).build())
        .with_task(TaskRecordBuilder::new("next", "travel", "x").after("slow").cost(10).build())
        .build();

    let options = RuntimeOptions {
        run_timeout: Some(Duration::from_secs(60)),
    };
    let run = run_with_fake(graph, Arc::new(Ledger::default()), "grace", options, |b| {
        b.delay("slow", Duration::from_secs(70))
    })
    .await;

    let summary = run.summary;
    assert_eq!(summary.status, GraphStatus::TimedOut);
    assert_eq!(summary.task("slow").unwrap().status, TaskStatus::Completed);
    // Never dispatched once the deadline passed.
    assert_eq!(summary.task("next").unwrap().status, TaskStatus::Failed);
    assert_eq!(run.dispatched.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn queued_completion_after_deadline_dispatches_nothing() {
    init_tracing();
    // The answer for "a" is queued before the slow dispatch call returns,
    // which is already past the deadline. "b" must never be dispatched.
    for round in 0..20 {
        let graph = GraphSpecBuilder::new("late", 100)
            .with_task(TaskRecordBuilder::new("a", "travel", "x").cost(10).build())
            .with_task(TaskRecordBuilder::new("b", "travel", "x").after("a").cost(10).build())
            .build();

        let options = RuntimeOptions {
            run_timeout: Some(Duration::from_secs(10)),
        };
        let run = run_with_fake(graph, Arc::new(Ledger::default()), "late", options, |b| {
            b.dispatch_latency(Duration::from_secs(11))
        })
        .await;

        assert_eq!(run.dispatched_ids(), vec!["a".to_string()], "round {round}");
        let summary = run.summary;
        assert_eq!(summary.status, GraphStatus::TimedOut, "round {round}");
        assert_eq!(summary.task("a").unwrap().status, TaskStatus::Completed);
        assert_eq!(summary.task("b").unwrap().status, TaskStatus::Failed);
        assert_eq!(summary.total_cost, 10);
    }
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_minutes_means_no_deadline() {
    let graph = GraphSpecBuilder::new("patient", 100)
        .timeout_minutes(0)
        .with_task(TaskRecordBuilder::new("slow", "travel", "x").cost(10).build())
        .build();

    let run = run_with_fake(graph, Arc::new(Ledger::default()), "patient", RuntimeOptions::default(), |b| {
        b.delay("slow", Duration::from_secs(2 * 60 * 60))
    })
    .await;

    assert_eq!(run.summary.status, GraphStatus::Completed);
}

#[tokio::test]
async fn unregistered_worker_fails_the_attempt() {
    init_tracing();
    let graph = GraphSpecBuilder::new("registry", 100)
        .with_task(TaskRecordBuilder::new("known", "travel", "lookup").cost(10).build())
        .with_task(TaskRecordBuilder::new("unknown", "queen", "plan").cost(10).retry_max(0).build())
        .build();

    let mut registry = WorkerRegistry::new();
    registry.register("travel", "lookup", |params: &Params| {
        Ok::<_, String>(json!({ "params": params.len() }))
    });

    let (tx, rx) = mpsc::channel(16);
    let backend = RegistryBackend::new(Arc::new(registry), tx);
    let core = CoreRuntime::new(graph, Arc::new(Ledger::default()), "registry").unwrap();

    let summary = timeout(
        Duration::from_secs(5),
        Runtime::new(core, rx, backend, RuntimeOptions::default()).run(),
    )
    .await
    .expect("run finished")
    .unwrap();

    assert_eq!(summary.task("known").unwrap().status, TaskStatus::Completed);
    let unknown = summary.task("unknown").unwrap();
    assert_eq!(unknown.status, TaskStatus::Failed);
    assert!(
        unknown
            .error_message
            .as_deref()
            .unwrap()
            .contains("no worker registered for agent 'queen' kind 'plan'")
    );
}

#[tokio::test]
async fn builtin_workers_run_a_trip_end_to_end() {
    init_tracing();
    let spec = GraphSpecBuilder::new("Plan a 5-day trip to Paris", 200)
        .with_task(
            TaskRecordBuilder::new("research", "travel", "research_destination")
                .cost(20)
                .param("destination", json!("Paris"))
                .param("duration", json!("5 days"))
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("flights", "travel", "find_flights")
                .after("research")
                .cost(30)
                .param("destination", json!("Paris"))
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("cost", "finance", "calculate_trip_cost")
                .after("flights")
                .cost(12)
                .build(),
        )
        .with_task(
            TaskRecordBuilder::new("compile", "compiler", "compile_results")
                .after("cost")
                .cost(8)
                .param("task_ids", json!(["research", "flights", "cost"]))
                .build(),
        )
        .spec();
    let loaded = accept_spec(spec, true).unwrap();

    let ledger = Arc::new(Ledger::default());
    let registry = Arc::new(WorkerRegistry::with_builtin_workers());
    let summary = timeout(
        Duration::from_secs(10),
        execute_graph(loaded, Arc::clone(&ledger), registry, "e2e", RuntimeOptions::default()),
    )
    .await
    .expect("run finished")
    .unwrap();

    assert_eq!(summary.status, GraphStatus::Completed, "{summary:#?}");
    assert_eq!(summary.count(TaskStatus::Completed), 4);
    assert_eq!(summary.total_cost, 70);
    assert_eq!(ledger.balance("e2e"), Some(130));

    let body = serde_json::to_value(&summary).unwrap();
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["subtasks"][0]["status"], "COMPLETED");
    assert_eq!(body["ledgerSummary"]["currentBalance"], 130);
}
