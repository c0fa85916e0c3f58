// src/dag/mod.rs

//! Task registry, run graphs and scheduling.
//!
//! - [`registry`] holds named task definitions and validates them as they
//!   are registered.
//! - [`graph`] expands a target into a run graph, lowering series
//!   composites into ordering edges.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready to run under the concurrency limit.
//! - [`task_info`] provides per-run task state and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod registry;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::RunGraph;
pub use registry::{TaskAction, TaskBody, TaskDef, TaskRegistry, TaskSpec};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{RunState, ScheduledTask};
