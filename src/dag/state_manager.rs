// src/dag/state_manager.rs

//! Per-run state management for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::dag::graph::RunGraph;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::engine::TaskName;

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    graph: &'a RunGraph,
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    run_id: u64,
}

impl<'a> StateManager<'a> {
    pub fn new(
        graph: &'a RunGraph,
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        run_id: u64,
    ) -> Self {
        Self {
            graph,
            tasks,
            run_id,
        }
    }

    /// A task may start once every direct dependency succeeded in this run.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep| {
            self.tasks
                .get(dep)
                .is_some_and(|d| d.run_state == RunState::Succeeded)
        })
    }

    /// Mark every pending task that (transitively) depends on `failed_task`
    /// as `Skipped`.
    ///
    /// Returns the newly skipped tasks that have an action, in
    /// registration order.
    pub fn mark_dependents_skipped(&mut self, failed_task: &str) -> Vec<TaskName> {
        let mut newly_skipped = Vec::new();

        for name in self.graph.transitive_dependents(failed_task) {
            if let Some(info) = self.tasks.get_mut(&name)
                && info.run_state == RunState::Pending
            {
                info.run_state = RunState::Skipped;
                debug!(
                    task = %info.name,
                    upstream = %failed_task,
                    "skipping dependent of failed task"
                );
                if info.action.is_some() {
                    newly_skipped.push(info.name.clone());
                }
            }
        }

        newly_skipped.sort_by_key(|n| self.graph.order_of(n));
        newly_skipped
    }

    /// Mark every pending task as `Skipped`. Used when a stop is requested.
    pub fn skip_all_pending(&mut self) -> Vec<TaskName> {
        let mut newly_skipped = Vec::new();
        for info in self.tasks.values_mut() {
            if info.run_state == RunState::Pending {
                info.run_state = RunState::Skipped;
                if info.action.is_some() {
                    newly_skipped.push(info.name.clone());
                }
            }
        }
        newly_skipped.sort_by_key(|n| self.graph.order_of(n));
        newly_skipped
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|info| info.run_state == RunState::Running)
            .count()
    }

    /// Collect tasks that are `Pending` and whose dependencies are satisfied,
    /// mark up to `max_running - running` of them as `Running`, and return
    /// them as `ScheduledTask`s. Ties are broken by registration order.
    ///
    /// Series composites have nothing to run; they succeed as soon as their
    /// dependencies did.
    pub fn collect_new_ready_tasks(&mut self, max_running: usize) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();

        loop {
            // Decide first, then mutate to avoid borrowing issues.
            let mut candidates: Vec<(usize, TaskName)> = self
                .tasks
                .values()
                .filter(|info| {
                    info.run_state == RunState::Pending && self.deps_satisfied_for_info(info)
                })
                .map(|info| (info.order, info.name.clone()))
                .collect();
            candidates.sort();

            let mut completed_composite = false;
            let mut running = self.running_count();

            for (_, name) in candidates {
                let Some(info) = self.tasks.get_mut(&name) else {
                    continue;
                };

                match &info.action {
                    None => {
                        debug!(task = %info.name, run_id = self.run_id, "composite complete");
                        info.run_state = RunState::Succeeded;
                        completed_composite = true;
                    }
                    Some(action) if running < max_running => {
                        info!(task = %info.name, run_id = self.run_id, "starting task");
                        info.run_state = RunState::Running;
                        running += 1;
                        ready.push(ScheduledTask {
                            name: info.name.clone(),
                            run_id: self.run_id,
                            action: action.clone(),
                        });
                    }
                    Some(_) => {
                        debug!(
                            task = %info.name,
                            run_id = self.run_id,
                            max_running,
                            "ready but concurrency limit reached"
                        );
                    }
                }
            }

            if !completed_composite {
                break;
            }
        }

        ready
    }

    /// Check if all tasks are in a terminal state.
    pub fn all_tasks_terminal(&self) -> bool {
        self.tasks.values().all(|info| info.run_state.is_terminal())
    }
}
