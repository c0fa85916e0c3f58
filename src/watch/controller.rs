// src/watch/controller.rs

//! The watch state machine.
//!
//! `Idle → Debouncing → Running → Idle`. The controller is pure: it is fed
//! events, timer expiries and run completions, and answers with the
//! commands the session loop should carry out. It never sees a clock of
//! its own; every input carries `now`.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::engine::TaskName;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// Waiting for the coalescing window to close.
    Debouncing { deadline: Instant },
    /// The watched task is running. `pending` records a change seen
    /// meanwhile; at most one.
    Running { pending: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    /// Arm the timer for `deadline`, replacing any armed timer.
    ScheduleTimer(Instant),
    RunTask(TaskName),
    Reload,
}

#[derive(Debug)]
pub struct WatchController {
    task: TaskName,
    debounce: Duration,
    state: WatchState,
}

impl WatchController {
    pub fn new(task: impl Into<TaskName>, debounce: Duration) -> Self {
        Self {
            task: task.into(),
            debounce,
            state: WatchState::Idle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, WatchState::Running { .. })
    }

    /// A matching change was observed.
    pub fn on_event(&mut self, now: Instant) -> Vec<WatchCommand> {
        match self.state {
            WatchState::Idle | WatchState::Debouncing { .. } => {
                let deadline = now + self.debounce;
                self.state = WatchState::Debouncing { deadline };
                vec![WatchCommand::ScheduleTimer(deadline)]
            }
            WatchState::Running { .. } => {
                debug!(task = %self.task, "change during run; queued");
                self.state = WatchState::Running { pending: true };
                Vec::new()
            }
        }
    }

    /// The armed timer fired. Superseded timers are ignored.
    pub fn on_timer(&mut self, now: Instant) -> Vec<WatchCommand> {
        match self.state {
            WatchState::Debouncing { deadline } if now >= deadline => {
                self.state = WatchState::Running { pending: false };
                vec![WatchCommand::RunTask(self.task.clone())]
            }
            _ => Vec::new(),
        }
    }

    /// The run started by [`WatchCommand::RunTask`] finished.
    pub fn on_run_finished(&mut self, success: bool, now: Instant) -> Vec<WatchCommand> {
        let WatchState::Running { pending } = self.state else {
            return Vec::new();
        };

        let mut commands = Vec::new();
        if success {
            commands.push(WatchCommand::Reload);
        }

        if pending {
            let deadline = now + self.debounce;
            self.state = WatchState::Debouncing { deadline };
            commands.push(WatchCommand::ScheduleTimer(deadline));
        } else {
            self.state = WatchState::Idle;
        }
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_millis(200);

    fn controller() -> WatchController {
        WatchController::new("styles", WINDOW)
    }

    #[test]
    fn burst_coalesces_into_one_run() {
        let mut c = controller();
        let t0 = Instant::now();

        c.on_event(t0);
        c.on_event(t0 + Duration::from_millis(50));
        let last = c.on_event(t0 + Duration::from_millis(100));
        let deadline = t0 + Duration::from_millis(300);
        assert_eq!(last, vec![WatchCommand::ScheduleTimer(deadline)]);

        // The first timer was superseded.
        assert!(c.on_timer(t0 + WINDOW).is_empty());
        assert_eq!(
            c.on_timer(deadline),
            vec![WatchCommand::RunTask("styles".into())]
        );
        assert_eq!(
            c.on_run_finished(true, deadline),
            vec![WatchCommand::Reload]
        );
        assert_eq!(c.state(), WatchState::Idle);
    }

    #[test]
    fn changes_during_run_queue_exactly_one_more() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(t0);
        c.on_timer(t0 + WINDOW);
        assert!(c.is_running());

        assert!(c.on_event(t0 + WINDOW).is_empty());
        assert!(c.on_event(t0 + WINDOW).is_empty());

        let done = t0 + WINDOW * 2;
        assert_eq!(
            c.on_run_finished(true, done),
            vec![
                WatchCommand::Reload,
                WatchCommand::ScheduleTimer(done + WINDOW)
            ]
        );
        assert_eq!(
            c.on_timer(done + WINDOW),
            vec![WatchCommand::RunTask("styles".into())]
        );
    }

    #[test]
    fn failed_run_does_not_reload() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_event(t0);
        c.on_timer(t0 + WINDOW);
        assert!(c.on_run_finished(false, t0 + WINDOW).is_empty());
        assert_eq!(c.state(), WatchState::Idle);
    }

    #[test]
    fn stray_inputs_are_ignored() {
        let mut c = controller();
        let t0 = Instant::now();
        assert!(c.on_timer(t0).is_empty());
        assert!(c.on_run_finished(true, t0).is_empty());
        assert_eq!(c.state(), WatchState::Idle);
    }
}
