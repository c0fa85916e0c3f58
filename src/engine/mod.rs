// src/engine/mod.rs

//! Orchestration engine for assetdag.
//!
//! This module ties together:
//! - the per-run scheduler (a pure state machine in [`crate::dag`])
//! - the executor backend that runs task actions
//! - the async runtime loop that reacts to task completions and shutdown
//!   requests, and assembles the [`BuildReport`]

use std::fmt;

use crate::errors::TaskError;

/// Canonical task name type used throughout the engine.
pub type TaskName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Success,
    Failure,
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildStatus::Success => f.write_str("success"),
            BuildStatus::Failure => f.write_str("failure"),
        }
    }
}

/// Outcome of one task execution.
#[derive(Debug)]
pub struct BuildResult {
    pub task_name: TaskName,
    pub status: BuildStatus,
    pub error: Option<TaskError>,
    pub duration_ms: u64,
}

impl BuildResult {
    pub fn success(task_name: impl Into<TaskName>, duration_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            status: BuildStatus::Success,
            error: None,
            duration_ms,
        }
    }

    pub fn failure(task_name: impl Into<TaskName>, error: TaskError, duration_ms: u64) -> Self {
        Self {
            task_name: task_name.into(),
            status: BuildStatus::Failure,
            error: Some(error),
            duration_ms,
        }
    }

    /// Build a result from what a task action returned.
    pub fn from_outcome(
        task_name: impl Into<TaskName>,
        outcome: Result<(), TaskError>,
        duration_ms: u64,
    ) -> Self {
        match outcome {
            Ok(()) => Self::success(task_name, duration_ms),
            Err(err) => Self::failure(task_name, err, duration_ms),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == BuildStatus::Success
    }
}

/// Runtime options for the async shell.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Upper bound on concurrently running tasks (at least 1).
    pub max_concurrency: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            max_concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// Events flowing into the runtime from executors and signal handlers.
#[derive(Debug)]
pub enum RuntimeEvent {
    /// A task action finished.
    TaskCompleted { run_id: u64, result: BuildResult },
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod report;
pub mod runtime;

pub use report::BuildReport;
pub use runtime::Runtime;
