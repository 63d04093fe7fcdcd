// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! [`CoreRuntime`] owns the task graph and the readiness tracker and talks to
//! the shared [`Ledger`]. It consumes [`RuntimeEvent`]s and produces a
//! [`CoreStep`]: the commands the IO shell should carry out next plus whether
//! the run is still going.
//!
//! It has no channels, no timers and performs no IO, so the whole execution
//! policy (charging, retries, cascades, stalls, deadline handling) can be unit
//! tested by feeding events by hand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::dag::{ScheduledTask, Scheduler, StateManager, TaskGraph, TaskId};
use crate::engine::summary::RunSummary;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::Result;
use crate::ledger::cost::retry_cost;
use crate::ledger::{Ledger, Memo, TransactionKind};
use crate::types::GraphStatus;

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone)]
pub enum CoreCommand {
    /// Hand these attempts to the worker backend. Each has already been
    /// charged to the ledger.
    DispatchTasks(Vec<ScheduledTask>),
    /// The run deadline passed while attempts were in flight. Wait at most
    /// `grace` for them, then call [`CoreRuntime::expire`].
    AwaitInFlight { grace: Duration },
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }

    fn idle() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: true,
        }
    }
}

#[derive(Debug)]
pub struct CoreRuntime {
    graph: TaskGraph,
    scheduler: Scheduler,
    ledger: Arc<Ledger>,
    session: String,
    /// Attempt number of every dispatched, unfinished task.
    in_flight: HashMap<TaskId, u32>,
    /// Ready tasks the last dispatch round could not afford.
    stalled: Vec<TaskId>,
    /// Set once the deadline passed or a shutdown was requested.
    drain_reason: Option<String>,
    warnings: Vec<String>,
}

impl CoreRuntime {
    /// Wrap a validated graph. Opens (or reuses) the ledger account for
    /// `session` with the graph's budget.
    pub fn new(
        graph: TaskGraph,
        ledger: Arc<Ledger>,
        session: impl Into<String>,
    ) -> Result<Self> {
        let session = session.into();
        let account = ledger.get_or_create_account(&session, graph.budget_credits)?;
        if account.current_balance != graph.budget_credits {
            warn!(
                session = %session,
                balance = account.current_balance,
                budget = graph.budget_credits,
                "reusing existing ledger account"
            );
        }

        let scheduler = Scheduler::new(&graph);
        Ok(Self {
            graph,
            scheduler,
            ledger,
            session,
            in_flight: HashMap::new(),
            stalled: Vec::new(),
            drain_reason: None,
            warnings: Vec::new(),
        })
    }

    /// Attach validation/repair notes so they end up in the run summary.
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    pub fn session_id(&self) -> &str {
        &self.session
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_draining(&self) -> bool {
        self.drain_reason.is_some()
    }

    /// Dispatch the initial ready set.
    pub fn start(&mut self) -> CoreStep {
        self.graph.status = GraphStatus::Running;
        info!(
            session = %self.session,
            goal = %self.graph.goal,
            tasks = self.graph.len(),
            budget = self.graph.budget_credits,
            "starting graph run"
        );
        self.settle(Vec::new())
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskFinished {
                task,
                attempt,
                outcome,
            } => {
                match self.in_flight.get(&task) {
                    Some(&expected) if expected == attempt => {
                        self.in_flight.remove(&task);
                    }
                    other => {
                        warn!(
                            task = %task,
                            attempt,
                            expected = ?other,
                            "ignoring stale or unexpected completion"
                        );
                        return CoreStep::idle();
                    }
                }
                self.apply_outcome(&task, outcome);
                self.settle(Vec::new())
            }
            RuntimeEvent::ShutdownRequested => self.on_deadline("shutdown requested"),
        }
    }

    /// The run deadline passed (or a shutdown was requested): stop
    /// dispatching and let in-flight attempts finish within their own timeout.
    pub fn on_deadline(&mut self, reason: &str) -> CoreStep {
        if self.drain_reason.is_some() {
            return CoreStep::idle();
        }

        info!(
            reason = %reason,
            in_flight = self.in_flight.len(),
            "run deadline reached; no further dispatches"
        );
        self.drain_reason = Some(reason.to_string());

        if self.in_flight.is_empty() {
            return self.expire(reason);
        }

        let grace_secs = self
            .in_flight
            .keys()
            .filter_map(|id| self.graph.task_by_id(id))
            .map(|t| t.timeout_seconds)
            .max()
            .unwrap_or(0);

        CoreStep {
            commands: vec![CoreCommand::AwaitInFlight {
                grace: Duration::from_secs(grace_secs),
            }],
            keep_running: true,
        }
    }

    /// Fail everything not yet terminal (in-flight attempts included), skip
    /// their dependents and end the run as timed out.
    pub fn expire(&mut self, reason: &str) -> CoreStep {
        let step = StateManager::new(&mut self.graph).expire_non_terminal(reason);
        if !step.failed.is_empty() {
            warn!(
                failed = ?step.failed,
                skipped = ?step.skipped,
                reason = %reason,
                "expired unfinished tasks"
            );
        }
        self.in_flight.clear();
        self.stalled.clear();
        self.graph.status = GraphStatus::TimedOut;
        CoreStep::stop()
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary::collect(
            &self.graph,
            &self.session,
            self.ledger.summary(&self.session),
            self.stalled.clone(),
            self.warnings.clone(),
        )
    }

    /// Decide what happens after a state change: finish a drain, dispatch
    /// newly ready work, or end the run.
    fn settle(&mut self, mut commands: Vec<CoreCommand>) -> CoreStep {
        if let Some(reason) = self.drain_reason.clone() {
            if self.in_flight.is_empty() {
                return self.expire(&reason);
            }
            return CoreStep {
                commands,
                keep_running: true,
            };
        }

        let dispatched = self.dispatch_ready();
        if !dispatched.is_empty() {
            commands.push(CoreCommand::DispatchTasks(dispatched));
        }

        if self.graph.all_terminal() {
            self.graph.status = GraphStatus::Completed;
            info!(
                total_cost = self.graph.total_cost,
                "all tasks reached a terminal state"
            );
            return CoreStep {
                commands,
                keep_running: false,
            };
        }

        if self.in_flight.is_empty() {
            self.graph.status = GraphStatus::BudgetExhausted;
            warn!(
                stalled = ?self.stalled,
                balance = self.ledger.balance(&self.session).unwrap_or(0),
                "budget exhausted; ready tasks cannot be afforded"
            );
            return CoreStep {
                commands,
                keep_running: false,
            };
        }

        CoreStep {
            commands,
            keep_running: true,
        }
    }

    /// Charge and mark in progress every ready task the balance covers.
    /// Unaffordable tasks stay `Pending` and are remembered as stalled.
    fn dispatch_ready(&mut self) -> Vec<ScheduledTask> {
        let mut dispatched = Vec::new();
        self.stalled.clear();

        for id in self.scheduler.ready(&self.graph) {
            let Some(task) = self.graph.task_by_id(&id) else {
                continue;
            };
            let cost = task.next_attempt_cost();
            let attempt = task.retry_count;
            let (kind, label) = if attempt == 0 {
                (TransactionKind::TaskExecution, "execution".to_string())
            } else {
                (TransactionKind::TaskRetry, format!("retry {attempt}"))
            };
            let memo = Memo::new(kind, format!("{label} of task '{id}' ({})", task.kind))
                .for_task(&id, &task.agent);

            let mut states = StateManager::new(&mut self.graph);
            states.mark_ready(&id);

            if !self.ledger.check_budget(&self.session, cost) {
                states.mark_waiting(&id);
                debug!(task = %id, cost, "insufficient balance; leaving task pending");
                self.stalled.push(id);
                continue;
            }

            match self.ledger.charge(&self.session, cost, memo) {
                Ok(tx) => {
                    states.mark_in_progress(&id, cost);
                    info!(task = %id, attempt, cost, tx = %tx.id, "dispatching task");
                }
                Err(err) => {
                    states.mark_waiting(&id);
                    warn!(task = %id, cost, error = %err, "charge failed; leaving task pending");
                    self.stalled.push(id);
                    continue;
                }
            }

            if let Some(task) = self.graph.task_by_id(&id) {
                dispatched.push(ScheduledTask::from_task(task, cost));
            }
            self.in_flight.insert(id, attempt);
        }

        dispatched
    }

    fn apply_outcome(&mut self, id: &str, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Success(output) => {
                StateManager::new(&mut self.graph).complete(id, output);
                self.scheduler.on_completed(&self.graph, id);
            }
            TaskOutcome::Failed(error) => {
                let Some(task) = self.graph.task_by_id(id) else {
                    warn!(task = %id, "outcome for unknown task; ignoring");
                    return;
                };
                let (retry_count, retry_max, base) =
                    (task.retry_count, task.retry_max, task.cost_estimate);

                let message = if let Some(reason) = &self.drain_reason {
                    Some(format!("{error} (not retried: {reason})"))
                } else if retry_count >= retry_max {
                    Some(error.clone())
                } else {
                    let next = retry_cost(base, retry_count + 1);
                    if self.ledger.check_budget(&self.session, next) {
                        None
                    } else {
                        let balance = self.ledger.balance(&self.session).unwrap_or(0);
                        Some(format!(
                            "{error} (retry {} needs {next} credits, {balance} left)",
                            retry_count + 1
                        ))
                    }
                };

                let mut states = StateManager::new(&mut self.graph);
                match message {
                    None => {
                        states.schedule_retry(id, &error);
                    }
                    Some(message) => {
                        states.fail(id, &message);
                    }
                }
            }
        }
    }
}
