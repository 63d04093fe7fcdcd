// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod ledger;
pub mod logging;
pub mod types;
pub mod workers;

use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::CliArgs;
use crate::config::{LoadedGraph, RunConfig, accept_spec, load_from_path};
use crate::dag::execution_order;
use crate::engine::{CoreRuntime, RunSummary, Runtime, RuntimeEvent, RuntimeOptions};
use crate::exec::{RegistryBackend, WorkerRegistry};
use crate::ledger::Ledger;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - graph loading, validation and repair
/// - the ledger
/// - core runtime / async runtime
/// - the worker registry backend
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let spec = load_from_path(&args.graph)
        .with_context(|| format!("loading graph from {}", args.graph.display()))?;
    let repair_enabled = spec.config.repair && !args.no_repair;
    let loaded = accept_spec(spec, repair_enabled)?;

    for warning in &loaded.warnings {
        warn!(warning = %warning, "validation warning");
    }

    if args.dry_run {
        print_dry_run(&loaded)?;
        return Ok(());
    }

    let session = args
        .session
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ledger = Arc::new(build_ledger(&loaded.config));
    let registry = Arc::new(WorkerRegistry::with_builtin_workers());

    let summary =
        execute_graph(loaded, ledger, registry, &session, RuntimeOptions::default()).await?;

    let body = summary.to_json_pretty()?;
    match &args.output {
        Some(path) => {
            fs::write(path, body)
                .with_context(|| format!("writing summary to {}", path.display()))?;
            info!(path = %path.display(), "run summary written");
        }
        None => println!("{body}"),
    }

    Ok(())
}

/// Run an accepted graph to completion against `registry`, charging `ledger`
/// under `session`, with Ctrl-C mapped to a graceful shutdown.
pub async fn execute_graph(
    loaded: LoadedGraph,
    ledger: Arc<Ledger>,
    registry: Arc<WorkerRegistry>,
    session: &str,
    options: RuntimeOptions,
) -> Result<RunSummary> {
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    let backend = RegistryBackend::new(registry, rt_tx);

    let mut notes = loaded.warnings;
    notes.extend(loaded.repairs.into_iter().map(|r| format!("repaired: {r}")));

    let core = CoreRuntime::new(loaded.graph, ledger, session)?.with_warnings(notes);
    let runtime = Runtime::new(core, rt_rx, backend, options);
    Ok(runtime.run().await?)
}

fn build_ledger(config: &RunConfig) -> Ledger {
    match &config.ledger_dir {
        Some(dir) => Ledger::with_persist_dir(config.session_capacity, dir.clone()),
        None => Ledger::new(config.session_capacity),
    }
}

/// Print goal, budget, warnings and the batch plan.
fn print_dry_run(loaded: &LoadedGraph) -> Result<()> {
    let graph = &loaded.graph;
    let batches = execution_order(graph)?;

    println!("taskhive dry-run");
    println!("  goal = {}", graph.goal);
    println!("  budget_credits = {}", graph.budget_credits);
    println!("  estimated_cost = {}", graph.estimated_cost());
    println!("  timeout_minutes = {}", graph.timeout_minutes);

    for note in &loaded.repairs {
        println!("  repaired: {note}");
    }
    for warning in &loaded.warnings {
        println!("  warning: {warning}");
    }
    println!();

    println!("batches ({}):", batches.len());
    for (i, batch) in batches.iter().enumerate() {
        println!("  {}. {}", i + 1, batch.join(", "));
        for id in batch {
            if let Some(task) = graph.task_by_id(id) {
                println!(
                    "      {id}: {}/{} cost={} retry_max={} timeout={}s",
                    task.agent,
                    task.kind,
                    task.cost_estimate,
                    task.retry_max,
                    task.timeout_seconds
                );
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
