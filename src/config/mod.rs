// src/config/mod.rs

//! Graph input handling.
//!
//! - [`model`] maps the graph file (TOML or JSON) onto [`GraphSpec`].
//! - [`validate`] checks a candidate graph and turns it into a [`TaskGraph`].
//! - [`repair`] is the one-shot fix-up pass tried before final rejection.
//! - [`loader`] reads files and ties the three together.
//!
//! [`TaskGraph`]: crate::dag::TaskGraph

pub mod loader;
pub mod model;
pub mod repair;
pub mod validate;

pub use loader::{LoadedGraph, accept_spec, default_graph_path, load_and_validate, load_from_path};
pub use model::{GraphSpec, RunConfig, TaskRecord};
pub use validate::{ErrorCategory, ValidationError, ValidationReport, Validator};
