// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::config::validate::ValidationError;
use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum HiveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid task graph: {}", join_errors(.0))]
    InvalidGraph(Vec<ValidationError>),

    #[error("Cycle detected in task graph: {0}")]
    DagCycle(String),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HiveError>;
