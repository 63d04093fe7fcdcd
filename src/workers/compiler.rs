// src/workers/compiler.rs

use serde_json::{Value, json};

use crate::dag::Params;
use crate::exec::WorkerRegistry;

pub fn register(registry: &mut WorkerRegistry) {
    registry.register("compiler", "compile_results", compile_results);
}

/// Summarise the `task_ids` (or `sources`) the generator asked to compile.
///
/// Workers only see their own parameters, so this reports which inputs were
/// named rather than their outputs; the run summary carries those.
fn compile_results(params: &Params) -> Result<Value, String> {
    let ids: Vec<&str> = params
        .get("task_ids")
        .or_else(|| params.get("sources"))
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    Ok(json!({
        "task_type": "compile_results",
        "compiled_tasks": ids,
        "total_tasks": ids.len(),
        "format": params.get("format").and_then(Value::as_str).unwrap_or("summary"),
    }))
}
