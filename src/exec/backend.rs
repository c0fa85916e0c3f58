// src/exec/backend.rs

//! The seam between the runtime and whatever actually performs task work.
//!
//! [`RealExecutorBackend`] hands every dispatched task to
//! [`super::task_runner::run_task`], which runs the action on the blocking
//! pool. Test backends record the dispatch and answer with synthetic
//! `TaskCompleted` events instead.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::task_runner::run_task;

/// Boxed future returned by [`ExecutorBackend::spawn_ready_tasks`].
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

pub trait ExecutorBackend: Send {
    /// Start every task in `tasks` and return without waiting on them.
    /// Each one must eventually produce exactly one
    /// `RuntimeEvent::TaskCompleted`.
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_>;
}

/// Runs task actions for real, one tokio task per dispatched build task.
pub struct RealExecutorBackend {
    events: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(events: mpsc::Sender<RuntimeEvent>) -> Self {
        Self { events }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_> {
        for task in tasks {
            tokio::spawn(run_task(task, self.events.clone()));
        }
        Box::pin(std::future::ready(Ok(())))
    }
}
