// src/workers/travel.rs

use serde_json::{Value, json};

use crate::dag::Params;
use crate::exec::WorkerRegistry;
use crate::workers::{parse_days, str_param};

const AIRLINES: [&str; 5] = [
    "Air France",
    "British Airways",
    "Emirates",
    "Lufthansa",
    "Singapore Airlines",
];
const HOTEL_CHAINS: [&str; 4] = ["Hilton", "Marriott", "Hyatt", "Radisson"];

pub fn register(registry: &mut WorkerRegistry) {
    registry
        .register("travel", "find_flights", find_flights)
        .register("travel", "find_hotels", find_hotels)
        .register("travel", "travel_planning", plan_itinerary)
        .register("travel", "research_destination", plan_itinerary)
        .register_fallback("travel", general);
}

fn city_info(destination: &str) -> (&'static str, &'static str) {
    match destination {
        "Paris" => ("France", "EUR"),
        "Barcelona" => ("Spain", "EUR"),
        "London" => ("UK", "GBP"),
        "Tokyo" => ("Japan", "JPY"),
        "New York" => ("USA", "USD"),
        "Sydney" => ("Australia", "AUD"),
        "Dubai" => ("UAE", "AED"),
        "Singapore" => ("Singapore", "SGD"),
        _ => ("Unknown", "USD"),
    }
}

/// Cheap deterministic spread so different destinations get different prices.
fn seed(text: &str) -> u64 {
    text.bytes()
        .fold(17u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

fn find_flights(params: &Params) -> Result<Value, String> {
    let destination = str_param(params, "destination", "Paris");
    let departure = str_param(params, "departure_city", "Current Location");
    let base = seed(destination);

    let mut flights: Vec<Value> = (0..3u64)
        .map(|i| {
            let airline = AIRLINES[(base.wrapping_add(i) % AIRLINES.len() as u64) as usize];
            let price = 300 + base.wrapping_add(i * 97) % 900;
            let number = 100 + base.wrapping_add(i * 7) % 900;
            json!({
                "airline": airline,
                "flight_number": format!("{}{number}", airline[..2].to_uppercase()),
                "departure_city": departure,
                "destination": destination,
                "price": price,
                "currency": "USD",
                "stops": i % 3,
            })
        })
        .collect();
    flights.sort_by_key(|f| f["price"].as_u64().unwrap_or(u64::MAX));

    let best = &flights[0];
    let recommendation = format!(
        "Best value flight: {} {} for ${}",
        best["airline"].as_str().unwrap_or_default(),
        best["flight_number"].as_str().unwrap_or_default(),
        best["price"]
    );

    Ok(json!({
        "task_type": "flight_search",
        "destination": destination,
        "departure_city": departure,
        "recommendation": recommendation,
        "total_options": flights.len(),
        "flights": flights,
    }))
}

fn find_hotels(params: &Params) -> Result<Value, String> {
    let destination = str_param(params, "destination", "Paris");
    let nights = parse_days(str_param(params, "duration", "3 days"));
    let budget_range = str_param(params, "budget_range", "mid-range");

    let (low, high) = match budget_range {
        "budget" => (50, 120),
        "luxury" => (300, 800),
        _ => (120, 300),
    };
    let base = seed(destination);

    let hotels: Vec<Value> = HOTEL_CHAINS
        .iter()
        .enumerate()
        .map(|(i, chain)| {
            let per_night: u64 = low + (base.wrapping_add(i as u64 * 53) % (high - low));
            json!({
                "name": format!("{chain} {destination}"),
                "chain": chain,
                "price_per_night": per_night,
                "total_price": per_night.saturating_mul(nights),
                "currency": "USD",
            })
        })
        .collect();

    Ok(json!({
        "task_type": "hotel_search",
        "destination": destination,
        "nights": nights,
        "budget_range": budget_range,
        "total_options": hotels.len(),
        "hotels": hotels,
    }))
}

fn plan_itinerary(params: &Params) -> Result<Value, String> {
    let destination = str_param(params, "destination", "Paris");
    let days = parse_days(str_param(params, "duration", "3 days"));
    let (country, currency) = city_info(destination);

    let activities = [
        "Visit famous landmarks",
        "Explore local museums",
        "Take a guided walking tour",
        "Try the local cuisine",
    ];
    let itinerary: Vec<Value> = (1..=days)
        .map(|day| {
            json!({
                "day": day,
                "activity": activities[((day - 1) % activities.len() as u64) as usize],
            })
        })
        .collect();

    Ok(json!({
        "task_type": "travel_planning",
        "destination": destination,
        "country": country,
        "currency": currency,
        "days": days,
        "itinerary": itinerary,
    }))
}

fn general(params: &Params) -> Result<Value, String> {
    let destination = str_param(params, "destination", "Paris");
    let duration = str_param(params, "duration", "3 days");
    Ok(json!({
        "task_type": "general_travel",
        "destination": destination,
        "duration": duration,
        "estimated_cost": 1200,
    }))
}
