pub mod builders;
pub mod fake_backend;

use std::sync::{Arc, Once};

use taskhive::dag::{ScheduledTask, TaskGraph};
use taskhive::engine::{CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions};
use taskhive::ledger::Ledger;
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

pub use fake_backend::FakeBackend;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Result of [`run_with_fake`].
pub struct FakeRun {
    pub summary: RunSummary,
    /// Every attempt handed to the backend, in dispatch order.
    pub dispatched: Vec<ScheduledTask>,
}

impl FakeRun {
    pub fn dispatched_ids(&self) -> Vec<String> {
        self.dispatched.iter().map(|t| t.id.clone()).collect()
    }
}

/// Run `graph` to completion on a [`FakeBackend`] configured by `configure`.
pub async fn run_with_fake(
    graph: TaskGraph,
    ledger: Arc<Ledger>,
    session: &str,
    options: RuntimeOptions,
    configure: impl FnOnce(FakeBackend) -> FakeBackend,
) -> FakeRun {
    let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
    let backend = configure(FakeBackend::new(tx));
    let log = backend.dispatch_log();

    let core = CoreRuntime::new(graph, ledger, session).expect("ledger account");
    let summary = Runtime::new(core, rx, backend, options)
        .run()
        .await
        .expect("runtime run");

    let dispatched = log.lock().unwrap().clone();
    FakeRun {
        summary,
        dispatched,
    }
}
