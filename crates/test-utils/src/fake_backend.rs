use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use taskhive::dag::ScheduledTask;
use taskhive::engine::{RuntimeEvent, TaskOutcome};
use taskhive::errors::Result;
use taskhive::exec::WorkerBackend;

/// A scripted worker backend that:
/// - records every attempt it receives
/// - answers each attempt with the next scripted outcome for that task
///   (success once the script runs out)
/// - optionally delays answers, or never answers at all
/// - can itself be slow to return from a dispatch call.
///
/// Delays use `tokio::time`, so tests on a paused clock stay instant.
#[derive(Clone)]
pub struct FakeBackend {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    scripts: Arc<Mutex<HashMap<String, VecDeque<TaskOutcome>>>>,
    delays: HashMap<String, Duration>,
    silent: HashSet<String>,
    dispatch_latency: Duration,
    dispatched: Arc<Mutex<Vec<ScheduledTask>>>,
}

impl FakeBackend {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            runtime_tx,
            scripts: Arc::new(Mutex::new(HashMap::new())),
            delays: HashMap::new(),
            silent: HashSet::new(),
            dispatch_latency: Duration::ZERO,
            dispatched: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer the next attempts of `task` with `outcomes`, in order.
    pub fn script(self, task: &str, outcomes: impl IntoIterator<Item = TaskOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(task.to_string())
            .or_default()
            .extend(outcomes);
        self
    }

    /// Fail the first `times` attempts of `task`.
    pub fn fail_times(self, task: &str, times: usize) -> Self {
        let failures = (0..times).map(|i| TaskOutcome::Failed(format!("scripted failure #{i}")));
        self.script(task, failures)
    }

    /// Fail every attempt of `task` (up to a generous bound).
    pub fn always_fail(self, task: &str) -> Self {
        self.fail_times(task, 64)
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        self.delays.insert(task.to_string(), delay);
        self
    }

    /// Never report an outcome for `task`.
    pub fn hang(mut self, task: &str) -> Self {
        self.silent.insert(task.to_string());
        self
    }

    /// Block every dispatch call for `latency` after the answers are queued.
    pub fn dispatch_latency(mut self, latency: Duration) -> Self {
        self.dispatch_latency = latency;
        self
    }

    /// Shared log of every dispatched attempt, in dispatch order.
    pub fn dispatch_log(&self) -> Arc<Mutex<Vec<ScheduledTask>>> {
        Arc::clone(&self.dispatched)
    }

    fn next_outcome(&self, task: &ScheduledTask) -> TaskOutcome {
        self.scripts
            .lock()
            .unwrap()
            .get_mut(&task.id)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                TaskOutcome::Success(json!({ "task": task.id, "attempt": task.attempt }))
            })
    }
}

impl WorkerBackend for FakeBackend {
    fn dispatch_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                self.dispatched.lock().unwrap().push(task.clone());

                if self.silent.contains(&task.id) {
                    continue;
                }

                let outcome = self.next_outcome(&task);
                let delay = self.delays.get(&task.id).copied().unwrap_or_default();
                let tx = self.runtime_tx.clone();

                tokio::spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    let _ = tx
                        .send(RuntimeEvent::TaskFinished {
                            task: task.id,
                            attempt: task.attempt,
                            outcome,
                        })
                        .await;
                });
            }

            if !self.dispatch_latency.is_zero() {
                tokio::time::sleep(self.dispatch_latency).await;
            }
            Ok(())
        })
    }
}
