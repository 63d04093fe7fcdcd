// src/workers/mod.rs

//! Built-in stub workers.
//!
//! They return canned but deterministic data so a graph can be run end to end
//! without any external service. Real deployments register their own
//! handlers on a [`WorkerRegistry`].

pub mod compiler;
pub mod finance;
pub mod travel;

use serde_json::Value;

use crate::dag::Params;
use crate::exec::WorkerRegistry;

/// Register every built-in worker on `registry`.
pub fn register_builtin(registry: &mut WorkerRegistry) {
    travel::register(registry);
    finance::register(registry);
    compiler::register(registry);
}

/// String parameter, falling back to `default` when missing or blank.
pub(crate) fn str_param<'a>(params: &'a Params, key: &str, default: &'a str) -> &'a str {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(default)
}

pub(crate) fn f64_param(params: &Params, key: &str, default: f64) -> f64 {
    params.get(key).and_then(Value::as_f64).unwrap_or(default)
}

/// Longest trip the stub workers will plan for.
pub(crate) const MAX_TRIP_DAYS: u64 = 365;

/// Days in a free-form duration such as `"5 days"`, `"2 weeks"` or
/// `"1 month"`. Defaults to 3, clamped to `1..=MAX_TRIP_DAYS`.
pub(crate) fn parse_days(duration: &str) -> u64 {
    let digits: String = duration.chars().filter(char::is_ascii_digit).collect();
    let mut days: u64 = digits.parse().unwrap_or(3);

    let lower = duration.to_lowercase();
    if lower.contains("week") {
        days = days.saturating_mul(7);
    } else if lower.contains("month") {
        days = days.saturating_mul(30);
    }
    days.clamp(1, MAX_TRIP_DAYS)
}

/// Round to two decimals for money amounts.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
