//! Cost model: pre-flight estimates and compounding retry costs.

use crate::dag::task_info::Params;

/// Heuristic estimate used when a generator leaves `cost_estimate` out.
pub fn estimate_task_cost(agent: &str, kind: &str, params: &Params) -> u64 {
    let base = match agent {
        "travel" => 15.0,
        "finance" => 12.0,
        "compiler" => 8.0,
        "queen" => 25.0,
        _ => 10.0,
    };

    let multiplier = match kind {
        "find_flights" => 1.5,
        "find_hotels" => 1.3,
        "calculate_trip_cost" => 1.2,
        "travel_planning" => 2.0,
        "compile_results" => 1.1,
        _ => 1.0,
    };

    let param_cost = params.len() as f64 * 0.5;

    ((base * multiplier + param_cost) as u64).max(1)
}

/// Cost of attempt `retry` of a task with estimate `base`:
/// `floor(base * 1.5^retry)`. Attempt 0 costs `base`.
pub fn retry_cost(base: u64, retry: u32) -> u64 {
    if retry == 0 {
        return base;
    }
    let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
    (base as f64 * 1.5f64.powi(exponent)) as u64
}
