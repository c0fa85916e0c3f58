// src/dag/task_info.rs

//! Per-run task state.

use std::fmt;

use crate::dag::registry::TaskAction;
use crate::engine::TaskName;

/// State of a task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Waiting on dependencies or on a free worker.
    Pending,
    /// Dispatched to the executor.
    Running,
    Succeeded,
    Failed,
    /// Never started: a dependency failed or a stop was requested.
    Skipped,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Succeeded | RunState::Failed | RunState::Skipped
        )
    }
}

/// Static task information for one run, plus its current state.
#[derive(Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Registration order.
    pub order: usize,
    /// Direct run-graph dependencies.
    pub deps: Vec<TaskName>,
    /// `None` for series composites.
    pub action: Option<TaskAction>,
    pub run_state: RunState,
}

impl fmt::Debug for TaskInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskInfo")
            .field("name", &self.name)
            .field("order", &self.order)
            .field("deps", &self.deps)
            .field("composite", &self.action.is_none())
            .field("run_state", &self.run_state)
            .finish()
    }
}

/// Description of a task that the scheduler wants the executor to run now.
#[derive(Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// All tasks dispatched for the same target invocation share a `run_id`.
    pub run_id: u64,
    pub action: TaskAction,
}

impl fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("run_id", &self.run_id)
            .finish_non_exhaustive()
    }
}
