// src/exec/task_runner.rs

//! Single attempt runner.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::registry::WorkerRegistry;

/// Run one attempt through the registry and report a `TaskFinished` event.
///
/// The handler runs on the blocking pool and is bounded by the task's
/// `timeout_seconds`; hitting the bound is reported as a failed attempt.
pub async fn run_attempt(
    task: ScheduledTask,
    registry: Arc<WorkerRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let outcome = attempt_outcome(&task, &registry).await;

    match &outcome {
        TaskOutcome::Success(_) => info!(
            task = %task.id,
            attempt = task.attempt,
            "attempt succeeded"
        ),
        TaskOutcome::Failed(err) => warn!(
            task = %task.id,
            attempt = task.attempt,
            error = %err,
            "attempt failed"
        ),
    }

    let event = RuntimeEvent::TaskFinished {
        task: task.id.clone(),
        attempt: task.attempt,
        outcome,
    };
    if runtime_tx.send(event).await.is_err() {
        error!(task = %task.id, "runtime gone; dropping attempt outcome");
    }
}

async fn attempt_outcome(task: &ScheduledTask, registry: &WorkerRegistry) -> TaskOutcome {
    let Some(handler) = registry.resolve(&task.agent, &task.kind) else {
        return TaskOutcome::Failed(format!(
            "no worker registered for agent '{}' kind '{}'",
            task.agent, task.kind
        ));
    };

    debug!(task = %task.id, agent = %task.agent, kind = %task.kind, "starting attempt");

    let params = task.params.clone();
    let work = tokio::task::spawn_blocking(move || handler.handle(&params));
    let limit = Duration::from_secs(task.timeout_seconds);

    match tokio::time::timeout(limit, work).await {
        Ok(Ok(Ok(output))) => TaskOutcome::Success(output),
        Ok(Ok(Err(err))) => TaskOutcome::Failed(err),
        Ok(Err(join_err)) => TaskOutcome::Failed(format!("worker panicked: {join_err}")),
        Err(_) => TaskOutcome::Failed(format!(
            "timed out after {}s",
            task.timeout_seconds
        )),
    }
}
