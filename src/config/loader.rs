// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::model::{GraphSpec, RunConfig};
use crate::config::repair::repair;
use crate::config::validate::Validator;
use crate::dag::TaskGraph;
use crate::errors::{HiveError, Result};

/// An accepted graph plus everything the caller should report about how it
/// was accepted.
#[derive(Debug, Clone)]
pub struct LoadedGraph {
    pub graph: TaskGraph,
    /// Non-fatal validation warnings.
    pub warnings: Vec<String>,
    /// Notes from the repair pass; empty when the graph was accepted as is.
    pub repairs: Vec<String>,
    pub config: RunConfig,
}

/// Read a graph file without validating it.
///
/// Files ending in `.json` are parsed as JSON, everything else as TOML.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<GraphSpec> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let spec: GraphSpec = if is_json {
        serde_json::from_str(&contents)?
    } else {
        toml::from_str(&contents)?
    };

    if spec.config.session_capacity == 0 {
        return Err(HiveError::ConfigError(
            "config.session_capacity must be at least 1".to_string(),
        ));
    }

    Ok(spec)
}

/// Validate a candidate spec, running the repair pass once if validation
/// fails and `repair_enabled` is set.
///
/// The report after repair is final: if the repaired spec is still invalid
/// the original errors are discarded and the post-repair errors returned.
pub fn accept_spec(spec: GraphSpec, repair_enabled: bool) -> Result<LoadedGraph> {
    let validator = Validator::default();
    let report = validator.validate(&spec);

    if report.is_ok() {
        let (graph, report) = validator.build(&spec)?;
        info!(
            tasks = graph.len(),
            budget = graph.budget_credits,
            "task graph accepted"
        );
        return Ok(LoadedGraph {
            graph,
            warnings: report.warnings,
            repairs: Vec::new(),
            config: spec.config,
        });
    }

    if !repair_enabled {
        return Err(HiveError::InvalidGraph(report.errors));
    }

    warn!(
        errors = report.errors.len(),
        "task graph rejected, attempting repair"
    );
    let mut repaired = spec;
    let repairs = repair(&mut repaired);
    let (graph, report) = validator.build(&repaired)?;
    info!(
        tasks = graph.len(),
        repairs = repairs.len(),
        "task graph accepted after repair"
    );

    Ok(LoadedGraph {
        graph,
        warnings: report.warnings,
        repairs,
        config: repaired.config,
    })
}

/// Load a graph file and run validation (and the repair pass, if the file's
/// `[config]` enables it).
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<LoadedGraph> {
    let spec = load_from_path(path)?;
    let repair_enabled = spec.config.repair;
    accept_spec(spec, repair_enabled)
}

/// Default graph file in the current working directory.
pub fn default_graph_path() -> PathBuf {
    PathBuf::from("taskhive.toml")
}
