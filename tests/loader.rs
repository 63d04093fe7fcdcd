// tests/loader.rs

use std::fs;
use std::path::PathBuf;

use taskhive::config::{load_and_validate, load_from_path};
use taskhive::errors::HiveError;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

const TRIP_TOML: &str = r#"
goal = "Plan a 5-day trip to Paris"
budget_credits = 100

[[subtasks]]
id = "research"
agent = "travel"
task = "research_destination"
cost_estimate = 20
params = { destination = "Paris", duration = "5 days" }

[[subtasks]]
id = "flights"
agent = "travel"
kind = "find_flights"
depends_on = ["research"]
cost_estimate = 30
"#;

#[test]
fn toml_graph_fills_defaults_and_aliases() {
    let dir = TempDir::new().unwrap();
    let path = write(&dir, "trip.toml", TRIP_TOML);

    let spec = load_from_path(&path).unwrap();
    assert_eq!(spec.timeout_minutes, 10);
    assert!(spec.config.repair);
    assert_eq!(spec.config.session_capacity, 100);

    let flights = &spec.subtasks[1];
    assert_eq!(flights.task, "find_flights");
    assert_eq!(flights.after, vec!["research".to_string()]);
    assert_eq!(flights.retry_max, 2);
    assert_eq!(flights.timeout_seconds, 30);

    let loaded = load_and_validate(&path).unwrap();
    assert_eq!(loaded.graph.len(), 2);
    assert!(loaded.repairs.is_empty());
    let research = loaded.graph.task_by_id("research").unwrap();
    assert_eq!(research.params["destination"], "Paris");
}

#[test]
fn json_graph_accepts_camel_case() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "trip.json",
        r#"{
            "goal": "Weekend in Rome",
            "budgetCredits": 80,
            "timeoutMinutes": 5,
            "subtasks": [
                {"id": "hotels", "agent": "travel", "task": "find_hotels", "costEstimate": 15},
                {"id": "cost", "agent": "finance", "task": "budget_breakdown",
                 "dependsOn": ["hotels"], "retryMax": 0, "timeoutSeconds": 12}
            ]
        }"#,
    );

    let loaded = load_and_validate(&path).unwrap();
    assert_eq!(loaded.graph.budget_credits, 80);
    assert_eq!(loaded.graph.timeout_minutes, 5);

    let cost = loaded.graph.task_by_id("cost").unwrap();
    assert_eq!(cost.depends_on, vec!["hotels".to_string()]);
    assert_eq!(cost.retry_max, 0);
    assert_eq!(cost.timeout_seconds, 12);
    assert_eq!(cost.cost_estimate, 10);
}

#[test]
fn config_section_controls_repair() {
    let dir = TempDir::new().unwrap();
    let body = r#"
goal = "Over budget"
budget_credits = 50

[config]
repair = false

[[subtasks]]
id = "a"
agent = "travel"
task = "x"
cost_estimate = 80
"#;
    let path = write(&dir, "graph.toml", body);
    assert!(matches!(
        load_and_validate(&path),
        Err(HiveError::InvalidGraph(_))
    ));

    let path = write(&dir, "repairable.toml", &body.replace("repair = false", "repair = true"));
    let loaded = load_and_validate(&path).unwrap();
    assert_eq!(loaded.repairs.len(), 1);
    assert_eq!(loaded.graph.task_by_id("a").unwrap().cost_estimate, 45);
}

#[test]
fn zero_session_capacity_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let body = format!("{TRIP_TOML}\n[config]\nsession_capacity = 0\n");
    let path = write(&dir, "graph.toml", &body);

    let err = load_from_path(&path).unwrap_err();
    assert!(matches!(err, HiveError::ConfigError(_)), "{err}");
}

#[test]
fn unreadable_files_surface_parse_errors() {
    let dir = TempDir::new().unwrap();

    let path = write(&dir, "broken.toml", "goal = ");
    assert!(matches!(load_from_path(&path), Err(HiveError::TomlError(_))));

    let path = write(&dir, "broken.json", "{ \"goal\": ");
    assert!(matches!(load_from_path(&path), Err(HiveError::JsonError(_))));

    let missing = dir.path().join("missing.toml");
    assert!(matches!(load_from_path(&missing), Err(HiveError::IoError(_))));
}
