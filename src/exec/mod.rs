// src/exec/mod.rs

//! Running task actions.
//!
//! The runtime only sees [`ExecutorBackend`]. In production that is
//! [`RealExecutorBackend`], which hands each task to [`task_runner`]; user
//! tasks from `[task.<name>]` become actions through [`command`].

pub mod backend;
pub mod command;
pub mod task_runner;

pub use backend::{DispatchFuture, ExecutorBackend, RealExecutorBackend};
pub use command::shell_action;
