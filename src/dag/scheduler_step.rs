// src/dag/scheduler_step.rs

use crate::dag::task_info::ScheduledTask;
use crate::engine::TaskName;

/// What changed when the scheduler consumed one input (start, completion,
/// or stop request).
///
/// Only `newly_scheduled` drives dispatch; the other fields exist for
/// logging and for tests that step the scheduler by hand.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Ready to hand to the executor now, in registration order.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Will not start in this run: a prerequisite failed or a stop was
    /// requested.
    pub newly_skipped: Vec<TaskName>,
    /// Set once no task is pending or running.
    pub run_just_finished: bool,
}
