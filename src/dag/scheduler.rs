use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::RunGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, TaskInfo};
use crate::engine::TaskName;

/// Scheduler holds the run graph of one target invocation plus the mutable
/// per-task state of that run.
///
/// It is a pure state machine: it never executes anything itself. The
/// runtime feeds it completions and dispatches what it returns.
///
/// It is responsible for:
/// - deciding when a task is ready (all deps succeeded)
/// - keeping at most `max_concurrency` tasks running
/// - skipping the transitive dependents of a failed task
/// - skipping everything still pending once a stop is requested
#[derive(Debug)]
pub struct Scheduler {
    graph: RunGraph,
    tasks: HashMap<TaskName, TaskInfo>,
    max_concurrency: usize,
    run_id: u64,
    stop_requested: bool,
    started: bool,
}

impl Scheduler {
    /// Construct a scheduler for an expanded, acyclic run graph.
    pub fn new(graph: RunGraph, max_concurrency: usize, run_id: u64) -> Self {
        let tasks = graph
            .tasks()
            .map(|name| {
                let info = TaskInfo {
                    name: name.to_string(),
                    order: graph.order_of(name),
                    deps: graph.dependencies_of(name).cloned().collect(),
                    action: graph.action_of(name).cloned(),
                    run_state: RunState::Pending,
                };
                (name.to_string(), info)
            })
            .collect();

        Self {
            graph,
            tasks,
            max_concurrency: max_concurrency.max(1),
            run_id,
            stop_requested: false,
            started: false,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn graph(&self) -> &RunGraph {
        &self.graph
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// State of the given task in this run, `None` if it is not part of it.
    pub fn run_state_of(&self, task: &str) -> Option<RunState> {
        self.tasks.get(task).map(|info| info.run_state)
    }

    pub fn is_finished(&self) -> bool {
        self.tasks.values().all(|info| info.run_state.is_terminal())
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|info| info.run_state == RunState::Running)
            .count()
    }

    /// Tasks with an action that never started, in registration order.
    pub fn skipped(&self) -> Vec<TaskName> {
        let mut skipped: Vec<&TaskInfo> = self
            .tasks
            .values()
            .filter(|info| info.run_state == RunState::Skipped && info.action.is_some())
            .collect();
        skipped.sort_by_key(|info| info.order);
        skipped.into_iter().map(|info| info.name.clone()).collect()
    }

    /// Dispatch the first ready tasks.
    pub fn start(&mut self) -> SchedulerStep {
        if self.started {
            warn!(run_id = self.run_id, "scheduler already started; ignoring");
            return SchedulerStep::default();
        }
        self.started = true;
        info!(
            run_id = self.run_id,
            target = %self.graph.target(),
            tasks = self.tasks.len(),
            max_concurrency = self.max_concurrency,
            "starting run"
        );

        let max = self.max_concurrency;
        let mut manager = self.manager();
        let newly_scheduled = manager.collect_new_ready_tasks(max);

        SchedulerStep {
            newly_scheduled,
            newly_skipped: Vec::new(),
            run_just_finished: self.is_finished(),
        }
    }

    /// Handle completion of a running task.
    pub fn step_completion(&mut self, task: &str, success: bool) -> SchedulerStep {
        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, "completion for unknown task; ignoring");
            return SchedulerStep::default();
        };

        if info.run_state != RunState::Running {
            warn!(
                task = %task,
                state = ?info.run_state,
                "completion for a task that is not running; ignoring"
            );
            return SchedulerStep::default();
        }

        let max = self.max_concurrency;
        let stop_requested = self.stop_requested;
        let mut newly_skipped = Vec::new();

        if success {
            info.run_state = RunState::Succeeded;
            debug!(task = %task, run_id = self.run_id, "task succeeded");
        } else {
            info.run_state = RunState::Failed;
            warn!(
                task = %task,
                run_id = self.run_id,
                "task failed; skipping its dependents"
            );
            newly_skipped = self.manager().mark_dependents_skipped(task);
        }

        let newly_scheduled = if stop_requested {
            Vec::new()
        } else {
            self.manager().collect_new_ready_tasks(max)
        };

        SchedulerStep {
            newly_scheduled,
            newly_skipped,
            run_just_finished: self.is_finished(),
        }
    }

    /// Stop dispatching. Pending tasks are skipped; running tasks drain.
    pub fn request_stop(&mut self) -> SchedulerStep {
        if self.stop_requested {
            return SchedulerStep::default();
        }
        self.stop_requested = true;
        let newly_skipped = self.manager().skip_all_pending();
        info!(
            run_id = self.run_id,
            skipped = newly_skipped.len(),
            running = self.running_count(),
            "stop requested; waiting for running tasks to finish"
        );

        SchedulerStep {
            newly_scheduled: Vec::new(),
            newly_skipped,
            run_just_finished: self.is_finished(),
        }
    }

    fn manager(&mut self) -> StateManager<'_> {
        StateManager::new(&self.graph, &mut self.tasks, self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dag::registry::{TaskAction, TaskRegistry};

    fn noop() -> TaskAction {
        Arc::new(|| Ok(()))
    }

    fn names(list: &[&str]) -> Vec<TaskName> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn build_registry() -> TaskRegistry {
        let mut reg = TaskRegistry::new();
        for name in ["clean", "scripts", "styles", "images", "assets"] {
            reg.register(name, vec![], noop()).unwrap();
        }
        reg.register_series(
            "build",
            vec![
                names(&["clean"]),
                names(&["scripts", "styles", "images"]),
                names(&["assets"]),
            ],
        )
        .unwrap();
        reg
    }

    fn scheduler(target: &str, max: usize) -> Scheduler {
        let graph = RunGraph::expand(&build_registry(), target).unwrap();
        Scheduler::new(graph, max, 1)
    }

    fn scheduled(step: &SchedulerStep) -> Vec<String> {
        step.newly_scheduled.iter().map(|t| t.name.clone()).collect()
    }

    #[test]
    fn build_runs_stage_by_stage() {
        let mut s = scheduler("build", 8);

        let step = s.start();
        assert_eq!(scheduled(&step), names(&["clean"]));

        let step = s.step_completion("clean", true);
        assert_eq!(scheduled(&step), names(&["scripts", "styles", "images"]));

        assert!(scheduled(&s.step_completion("styles", true)).is_empty());
        assert!(scheduled(&s.step_completion("scripts", true)).is_empty());
        let step = s.step_completion("images", true);
        assert_eq!(scheduled(&step), names(&["assets"]));

        let step = s.step_completion("assets", true);
        assert!(step.run_just_finished);
        assert_eq!(s.run_state_of("build"), Some(RunState::Succeeded));
        assert!(s.skipped().is_empty());
    }

    #[test]
    fn respects_concurrency_limit() {
        let mut s = scheduler("build", 2);
        s.start();

        let step = s.step_completion("clean", true);
        assert_eq!(scheduled(&step), names(&["scripts", "styles"]));
        assert_eq!(s.running_count(), 2);

        let step = s.step_completion("scripts", true);
        assert_eq!(scheduled(&step), names(&["images"]));
    }

    #[test]
    fn failure_skips_only_dependents() {
        let mut s = scheduler("build", 8);
        s.start();
        s.step_completion("clean", true);

        let step = s.step_completion("scripts", false);
        assert_eq!(step.newly_skipped, names(&["assets"]));
        assert!(!step.run_just_finished);
        assert_eq!(s.run_state_of("styles"), Some(RunState::Running));

        s.step_completion("styles", true);
        let step = s.step_completion("images", true);
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
        assert_eq!(s.skipped(), names(&["assets"]));
        assert_eq!(s.run_state_of("build"), Some(RunState::Skipped));
    }

    #[test]
    fn stop_skips_pending_and_drains_running() {
        let mut s = scheduler("build", 8);
        s.start();
        s.step_completion("clean", true);

        let step = s.request_stop();
        assert_eq!(step.newly_skipped, names(&["assets"]));
        assert!(!step.run_just_finished);

        s.step_completion("scripts", true);
        s.step_completion("styles", true);
        let step = s.step_completion("images", true);
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
    }

    #[test]
    fn ignores_completion_of_task_not_running() {
        let mut s = scheduler("build", 8);
        s.start();
        let step = s.step_completion("assets", true);
        assert!(step.newly_scheduled.is_empty());
        assert_eq!(s.run_state_of("assets"), Some(RunState::Pending));
    }
}
