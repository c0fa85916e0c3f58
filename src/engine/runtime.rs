// src/engine/runtime.rs

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dag::{RunGraph, ScheduledTask, Scheduler, TaskRegistry};
use crate::engine::{BuildReport, RuntimeEvent, RuntimeOptions, TaskName};
use crate::errors::Result;
use crate::exec::ExecutorBackend;

/// Drives a [`Scheduler`] in response to `RuntimeEvent`s and delegates the
/// actual task execution to an `ExecutorBackend`.
///
/// This is the async IO shell; all ordering decisions live in the
/// scheduler. One `Runtime` serves many target invocations (the initial
/// build and every watch-triggered run).
pub struct Runtime<E: ExecutorBackend> {
    registry: Arc<TaskRegistry>,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    options: RuntimeOptions,
    run_counter: u64,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .field("run_counter", &self.run_counter)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(
        registry: Arc<TaskRegistry>,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            registry,
            event_rx,
            executor,
            options,
            run_counter: 0,
        }
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn options(&self) -> RuntimeOptions {
        self.options
    }

    /// Dispatch waves for `target` without executing anything.
    ///
    /// Series composites are left out; they have nothing to run.
    pub fn plan(&self, target: &str) -> Result<Vec<Vec<TaskName>>> {
        let graph = RunGraph::expand(&self.registry, target)?;
        let waves = graph
            .waves()?
            .into_iter()
            .map(|wave| {
                wave.into_iter()
                    .filter(|name| !graph.is_composite(name))
                    .collect::<Vec<_>>()
            })
            .filter(|wave| !wave.is_empty())
            .collect();
        Ok(waves)
    }

    /// Run `target` and everything it depends on.
    ///
    /// Configuration errors (unknown target, cycles) are returned before
    /// any task executes. Task failures never abort the run; they end up
    /// in the report.
    pub async fn run_target(&mut self, target: &str) -> Result<BuildReport> {
        let graph = RunGraph::expand(&self.registry, target)?;
        graph.waves()?;

        self.run_counter += 1;
        let run_id = self.run_counter;
        let started = Instant::now();

        let mut scheduler = Scheduler::new(graph, self.options.max_concurrency, run_id);
        let mut results = Vec::new();
        let mut interrupted = false;

        let step = scheduler.start();
        self.spawn_ready(step.newly_scheduled).await?;

        while !scheduler.is_finished() {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    return Err(anyhow!("runtime event channel closed during run {run_id}").into());
                }
            };

            match event {
                RuntimeEvent::TaskCompleted {
                    run_id: event_run,
                    result,
                } if event_run == run_id => {
                    let step = scheduler.step_completion(&result.task_name, result.is_success());
                    results.push(result);
                    self.spawn_ready(step.newly_scheduled).await?;
                }
                RuntimeEvent::TaskCompleted {
                    run_id: event_run,
                    result,
                } => {
                    warn!(
                        task = %result.task_name,
                        event_run,
                        run_id,
                        "completion from a previous run; ignoring"
                    );
                }
                RuntimeEvent::ShutdownRequested => {
                    info!(run_id, "shutdown requested during run");
                    interrupted = true;
                    scheduler.request_stop();
                }
            }
        }

        let report = BuildReport {
            target: target.to_string(),
            run_id,
            results,
            skipped: scheduler.skipped(),
            interrupted,
            duration: started.elapsed(),
        };

        info!(
            target = %report.target,
            run_id,
            success = report.is_success(),
            duration_ms = report.duration.as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
