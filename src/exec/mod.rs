// src/exec/mod.rs

//! Worker boundary.
//!
//! - [`backend`] provides the `WorkerBackend` trait the runtime dispatches
//!   through, and the production `RegistryBackend`.
//! - [`registry`] maps `(agent, kind)` to task handlers.
//! - [`task_runner`] runs a single attempt under its timeout and reports the
//!   outcome back to the runtime.

pub mod backend;
pub mod registry;
pub mod task_runner;

pub use backend::{RegistryBackend, WorkerBackend};
pub use registry::{TaskHandler, WorkerRegistry};
