// src/engine/report.rs

use std::fmt;
use std::time::Duration;

use crate::engine::{BuildResult, TaskName};

/// Aggregate outcome of one target invocation.
#[derive(Debug)]
pub struct BuildReport {
    pub target: TaskName,
    pub run_id: u64,
    /// One entry per dispatched task, in completion order.
    pub results: Vec<BuildResult>,
    /// Tasks that never started, in registration order.
    pub skipped: Vec<TaskName>,
    /// A stop was requested while the run was in progress.
    pub interrupted: bool,
    pub duration: Duration,
}

impl BuildReport {
    /// Every dispatched task succeeded, nothing was skipped and the run was
    /// not interrupted.
    pub fn is_success(&self) -> bool {
        !self.interrupted
            && self.skipped.is_empty()
            && self.results.iter().all(BuildResult::is_success)
    }

    pub fn failed_tasks(&self) -> impl Iterator<Item = &BuildResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn result_of(&self, task: &str) -> Option<&BuildResult> {
        self.results.iter().find(|r| r.task_name == task)
    }

    /// Names of the tasks that ran, in completion order.
    pub fn completed(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.task_name.as_str()).collect()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ms = self.duration.as_millis();
        if self.is_success() {
            return write!(
                f,
                "'{}' finished: {} task(s) succeeded in {ms} ms",
                self.target,
                self.results.len()
            );
        }

        write!(f, "'{}' failed after {ms} ms", self.target)?;
        if self.interrupted {
            write!(f, " (interrupted)")?;
        }
        for result in self.failed_tasks() {
            match &result.error {
                Some(err) => write!(f, "\n  failed:  {}: {err}", result.task_name)?,
                None => write!(f, "\n  failed:  {}", result.task_name)?,
            }
        }
        for name in &self.skipped {
            write!(f, "\n  skipped: {name}")?;
        }
        Ok(())
    }
}
