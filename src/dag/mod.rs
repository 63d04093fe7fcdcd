// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] holds the task graph and its structural queries.
//! - [`scheduler`] computes batch plans and ready sets.
//! - [`task_info`] provides the task node and scheduled-attempt types.
//! - [`scheduler_step`] defines the result types of state transitions.
//! - [`state_manager`] applies per-task state transitions and cascades.

pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::TaskGraph;
pub use scheduler::{Scheduler, execution_order, ready_set};
pub use scheduler_step::{ExpireStep, OutcomeStep};
pub use state_manager::StateManager;
pub use task_info::{Params, ScheduledTask, Task, TaskId};
