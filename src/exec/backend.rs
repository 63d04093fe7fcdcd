// src/exec/backend.rs

//! Pluggable worker backend abstraction.
//!
//! The runtime talks to a `WorkerBackend` instead of calling workers
//! directly. This makes it easy to swap in a scripted backend in tests while
//! keeping the production path in [`RegistryBackend`].

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;
use crate::exec::registry::WorkerRegistry;
use crate::exec::task_runner::run_attempt;

/// Trait abstracting how charged attempts reach the worker boundary.
///
/// Implementations must eventually send exactly one
/// `RuntimeEvent::TaskFinished` per dispatched attempt, carrying the
/// attempt number from the `ScheduledTask`.
pub trait WorkerBackend: Send {
    fn dispatch_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: one Tokio task per attempt, resolved through a
/// [`WorkerRegistry`].
#[derive(Debug)]
pub struct RegistryBackend {
    registry: Arc<WorkerRegistry>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RegistryBackend {
    pub fn new(registry: Arc<WorkerRegistry>, runtime_tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            registry,
            runtime_tx,
        }
    }
}

impl WorkerBackend for RegistryBackend {
    fn dispatch_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let registry = Arc::clone(&self.registry);
        let tx = self.runtime_tx.clone();

        Box::pin(async move {
            for task in tasks {
                tokio::spawn(run_attempt(task, Arc::clone(&registry), tx.clone()));
            }
            Ok(())
        })
    }
}
