use std::sync::{Arc, Mutex};

use assetdag::dag::ScheduledTask;
use assetdag::engine::{BuildResult, RuntimeEvent};
use assetdag::exec::{DispatchFuture, ExecutorBackend};
use tokio::sync::mpsc;

/// A fake executor that:
/// - runs each scheduled action inline, in dispatch order
/// - records the names of the tasks it ran
/// - reports `TaskCompleted` from a spawned task, so a full channel never
///   blocks the runtime that is waiting on this call.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl FakeExecutor {
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            runtime_tx,
            executed,
        }
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> DispatchFuture<'_> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);

        Box::pin(async move {
            for task in tasks {
                executed.lock().unwrap().push(task.name.clone());

                let outcome = (task.action)();
                let result = BuildResult::from_outcome(task.name.clone(), outcome, 0);
                let run_id = task.run_id;
                let tx = tx.clone();
                tokio::spawn(async move {
                    let _ = tx
                        .send(RuntimeEvent::TaskCompleted { run_id, result })
                        .await;
                });
            }
            Ok(())
        })
    }
}
