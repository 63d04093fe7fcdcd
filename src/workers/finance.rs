// src/workers/finance.rs

use serde_json::{Value, json};

use crate::dag::Params;
use crate::exec::WorkerRegistry;
use crate::workers::{f64_param, parse_days, round2, str_param};

pub fn register(registry: &mut WorkerRegistry) {
    registry
        .register("finance", "calculate_trip_cost", trip_cost)
        .register("finance", "budget_breakdown", budget_breakdown)
        .register("finance", "currency_conversion", currency_conversion)
        .register_fallback("finance", budget_breakdown);
}

fn destination_multiplier(destination: &str) -> f64 {
    match destination {
        "Paris" => 1.3,
        "London" => 1.4,
        "Tokyo" => 1.2,
        "New York" => 1.5,
        "Sydney" => 1.1,
        "Singapore" => 0.9,
        "Barcelona" => 0.8,
        "Lisbon" => 0.7,
        "Prague" => 0.6,
        "Bangkok" | "Budapest" => 0.5,
        _ => 1.0,
    }
}

/// Daily base cost per category for a budget tier.
fn daily_costs(tier: &str) -> [(&'static str, f64); 5] {
    match tier {
        "budget" => [
            ("accommodation", 60.0),
            ("food", 25.0),
            ("transportation", 15.0),
            ("activities", 20.0),
            ("miscellaneous", 10.0),
        ],
        "luxury" => [
            ("accommodation", 400.0),
            ("food", 120.0),
            ("transportation", 80.0),
            ("activities", 150.0),
            ("miscellaneous", 50.0),
        ],
        _ => [
            ("accommodation", 150.0),
            ("food", 60.0),
            ("transportation", 30.0),
            ("activities", 50.0),
            ("miscellaneous", 25.0),
        ],
    }
}

fn flight_cost(tier: &str) -> f64 {
    match tier {
        "budget" => 400.0,
        "luxury" => 1200.0,
        _ => 700.0,
    }
}

fn exchange_rate(currency: &str) -> Option<f64> {
    match currency {
        "USD" => Some(1.0),
        "EUR" => Some(0.85),
        "GBP" => Some(0.75),
        "JPY" => Some(110.0),
        "AUD" | "SGD" => Some(1.35),
        "AED" => Some(3.67),
        _ => None,
    }
}

fn trip_cost(params: &Params) -> Result<Value, String> {
    let destination = str_param(params, "destination", "Unknown");
    let days = parse_days(str_param(params, "duration", "3 days"));
    let tier = str_param(params, "budget_category", "mid_range");
    let total_budget = f64_param(params, "total_budget", 2000.0);

    let multiplier = destination_multiplier(destination);
    let mut breakdown = serde_json::Map::new();
    let mut per_day = 0.0;
    for (category, base) in daily_costs(tier) {
        let cost = base * multiplier;
        per_day += cost;
        breakdown.insert(category.to_string(), json!(round2(cost)));
    }

    let flights = flight_cost(tier) * multiplier;
    let estimated = per_day * days as f64 + flights;
    let difference = total_budget - estimated;
    let status = if difference >= 0.0 {
        "within_budget"
    } else {
        "over_budget"
    };

    Ok(json!({
        "task_type": "trip_cost_calculation",
        "destination": destination,
        "days": days,
        "budget_category": tier,
        "total_budget": total_budget,
        "estimated_cost": round2(estimated),
        "budget_difference": round2(difference),
        "budget_status": status,
        "daily_breakdown": breakdown,
        "flight_cost": round2(flights),
        "cost_per_day": round2(per_day),
        "currency": "USD",
    }))
}

fn budget_breakdown(params: &Params) -> Result<Value, String> {
    let total_budget = f64_param(params, "total_budget", 2000.0);
    let days = parse_days(str_param(params, "duration", "3 days"));

    let shares = [
        ("accommodation", 0.35),
        ("food", 0.25),
        ("transportation", 0.20),
        ("activities", 0.15),
        ("emergency_fund", 0.05),
    ];

    let mut allocation = serde_json::Map::new();
    let mut daily_limits = serde_json::Map::new();
    for (category, share) in shares {
        let amount = total_budget * share;
        allocation.insert(category.to_string(), json!(round2(amount)));
        if category != "emergency_fund" {
            daily_limits.insert(category.to_string(), json!(round2(amount / days as f64)));
        }
    }

    Ok(json!({
        "task_type": "budget_breakdown",
        "total_budget": total_budget,
        "days": days,
        "budget_allocation": allocation,
        "daily_spending_limits": daily_limits,
        "currency": "USD",
    }))
}

fn currency_conversion(params: &Params) -> Result<Value, String> {
    let amount = f64_param(params, "amount", 1000.0);
    let from = str_param(params, "from_currency", "USD");
    let to = str_param(params, "to_currency", "EUR");

    let from_rate =
        exchange_rate(from).ok_or_else(|| format!("unsupported currency '{from}'"))?;
    let to_rate = exchange_rate(to).ok_or_else(|| format!("unsupported currency '{to}'"))?;

    Ok(json!({
        "task_type": "currency_conversion",
        "original_amount": amount,
        "from_currency": from,
        "to_currency": to,
        "converted_amount": round2(amount / from_rate * to_rate),
        "exchange_rate": (to_rate / from_rate * 10_000.0).round() / 10_000.0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trip_cost_flags_over_budget() {
        let mut params = Params::new();
        params.insert("destination".into(), json!("Paris"));
        params.insert("duration".into(), json!("5 days"));
        params.insert("total_budget".into(), json!(500));

        let out = trip_cost(&params).unwrap();
        assert_eq!(out["days"], 5);
        assert_eq!(out["budget_status"], "over_budget");
    }

    #[test]
    fn unknown_currency_is_a_task_failure() {
        let mut params = Params::new();
        params.insert("to_currency".into(), json!("XYZ"));
        let err = currency_conversion(&params).unwrap_err();
        assert!(err.contains("XYZ"));
    }
}
