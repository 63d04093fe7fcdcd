// src/engine/runtime.rs

use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::summary::RunSummary;
use crate::errors::Result;
use crate::exec::WorkerBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, CoreStep, RuntimeEvent, RuntimeOptions};

/// Drives a [`CoreRuntime`] in response to [`RuntimeEvent`]s and delegates
/// task attempts to a [`WorkerBackend`].
///
/// This is the async IO shell: it owns the event channel, the run deadline
/// and the grace timer. All execution semantics live in the core.
pub struct Runtime<B: WorkerBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    backend: B,
    options: RuntimeOptions,
}

impl<B: WorkerBackend> fmt::Debug for Runtime<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<B: WorkerBackend> Runtime<B> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        backend: B,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            core,
            event_rx,
            backend,
            options,
        }
    }

    /// Run the graph to a terminal state and return the summary.
    ///
    /// A graph `timeout_minutes` of zero (and no override) means no run
    /// deadline.
    pub async fn run(mut self) -> Result<RunSummary> {
        let run_timeout = self.options.run_timeout.or_else(|| {
            let minutes = self.core.graph().timeout_minutes;
            (minutes > 0).then(|| Duration::from_secs(minutes.saturating_mul(60)))
        });
        let deadline = run_timeout.map(|t| Instant::now() + t);
        let mut grace_deadline: Option<Instant> = None;

        info!(session = %self.core.session_id(), ?run_timeout, "runtime started");

        let step = self.core.start();
        let mut keep_running = self.execute(step, &mut grace_deadline).await?;

        while keep_running {
            let wake_at = grace_deadline.or(deadline);

            // The deadline branch goes first so a queued completion can never
            // trigger a dispatch once the run deadline has passed.
            tokio::select! {
                biased;

                _ = sleep_until_opt(wake_at) => {
                    if grace_deadline.is_some() {
                        warn!(
                            in_flight = self.core.in_flight(),
                            "grace period elapsed; failing attempts still in flight"
                        );
                        self.core.expire("timed out waiting for in-flight attempt");
                        break;
                    }
                    let step = self.core.on_deadline("run deadline exceeded");
                    keep_running = self.execute(step, &mut grace_deadline).await?;
                }

                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        warn!("runtime event channel closed; expiring open tasks");
                        self.core.expire("runtime event channel closed");
                        break;
                    };
                    debug!(?event, "runtime received event");

                    if deadline_passed(deadline) && !self.core.is_draining() {
                        let step = self.core.on_deadline("run deadline exceeded");
                        keep_running = self.execute(step, &mut grace_deadline).await?;
                        if !keep_running {
                            break;
                        }
                    }

                    let step = self.core.step(event);
                    keep_running = self.execute(step, &mut grace_deadline).await?;
                }
            }
        }

        let summary = self.core.summary();
        info!(
            status = %summary.status,
            total_cost = summary.total_cost,
            "runtime exiting"
        );
        Ok(summary)
    }

    async fn execute(
        &mut self,
        step: CoreStep,
        grace_deadline: &mut Option<Instant>,
    ) -> Result<bool> {
        for command in step.commands {
            match command {
                CoreCommand::DispatchTasks(tasks) => self.dispatch(tasks).await?,
                CoreCommand::AwaitInFlight { grace } => {
                    info!(
                        ?grace,
                        in_flight = self.core.in_flight(),
                        "waiting for in-flight attempts"
                    );
                    *grace_deadline = Some(Instant::now() + grace);
                }
            }
        }
        Ok(step.keep_running)
    }

    async fn dispatch(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = tasks.iter().map(|t| t.id.as_str()).collect();
        debug!(?ids, "dispatching ready tasks");

        self.backend.dispatch_tasks(tasks).await
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|at| at <= Instant::now())
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}
