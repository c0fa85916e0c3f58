// src/exec/task_runner.rs

//! Individual task runner.

use std::any::Any;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{BuildResult, RuntimeEvent};
use crate::errors::TaskError;

/// Run a single task and emit its `TaskCompleted` event.
pub async fn run_task(task: ScheduledTask, runtime_tx: mpsc::Sender<RuntimeEvent>) {
    let run_id = task.run_id;
    let result = execute(task).await;

    if let Err(err) = runtime_tx
        .send(RuntimeEvent::TaskCompleted { run_id, result })
        .await
    {
        warn!(run_id, error = %err, "runtime gone; dropping task completion");
    }
}

/// Run the task action on the blocking worker pool.
///
/// Errors and panics become a failed [`BuildResult`]; they never escape.
pub async fn execute(task: ScheduledTask) -> BuildResult {
    info!(task = %task.name, run_id = task.run_id, "running task");

    let started = Instant::now();
    let action = task.action.clone();
    let joined = tokio::task::spawn_blocking(move || action()).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(join_err) if join_err.is_panic() => {
            Err(TaskError::Panicked(panic_message(join_err.into_panic())))
        }
        Err(join_err) => Err(TaskError::Panicked(join_err.to_string())),
    };

    let result = BuildResult::from_outcome(task.name, outcome, duration_ms);
    log_result(&result, task.run_id);
    result
}

/// Log a finished task, with file/line context for stage errors.
pub fn log_result(result: &BuildResult, run_id: u64) {
    match &result.error {
        None => info!(
            task = %result.task_name,
            run_id,
            duration_ms = result.duration_ms,
            "task succeeded"
        ),
        Some(TaskError::Stage(stage)) => error!(
            task = %result.task_name,
            run_id,
            stage = %stage.stage,
            file = ?stage.file,
            line = ?stage.line,
            column = ?stage.column,
            "task failed: {}",
            stage.message
        ),
        Some(err) => error!(
            task = %result.task_name,
            run_id,
            kind = ?err.kind(),
            duration_ms = result.duration_ms,
            "task failed: {err}"
        ),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
