// tests/runtime_concurrency.rs

mod common;
use crate::common::{init_tracing, real_runtime, with_timeout};

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use assetdag::dag::{TaskAction, TaskRegistry};
use assetdag::errors::{StageError, TaskError};

type TestResult = Result<(), Box<dyn Error>>;

/// A barrier that gives up: every party waits until `parties` have
/// arrived, or fails after `patience`.
struct Rendezvous {
    arrived: Mutex<usize>,
    all_here: Condvar,
    parties: usize,
    patience: Duration,
}

impl Rendezvous {
    fn new(parties: usize, patience: Duration) -> Arc<Self> {
        Arc::new(Self {
            arrived: Mutex::new(0),
            all_here: Condvar::new(),
            parties,
            patience,
        })
    }

    fn meet(&self) -> Result<(), TaskError> {
        let mut arrived = self.arrived.lock().unwrap();
        *arrived += 1;
        self.all_here.notify_all();
        let (arrived, timeout) = self
            .all_here
            .wait_timeout_while(arrived, self.patience, |n| *n < self.parties)
            .unwrap();
        if timeout.timed_out() && *arrived < self.parties {
            return Err(StageError::new("rendezvous", "the other task never started").into());
        }
        Ok(())
    }
}

/// `left` and `right` are independent; `both` groups them.
fn pair(action: TaskAction) -> Arc<TaskRegistry> {
    let mut registry = TaskRegistry::new();
    registry
        .register("left", Vec::new(), Arc::clone(&action))
        .unwrap();
    registry.register("right", Vec::new(), action).unwrap();
    registry
        .register_series("both", vec![vec!["left".into(), "right".into()]])
        .unwrap();
    Arc::new(registry)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn independent_tasks_overlap_on_the_real_executor() -> TestResult {
    init_tracing();
    let meeting = Rendezvous::new(2, Duration::from_secs(5));
    let action: TaskAction = Arc::new(move || meeting.meet());
    let mut runtime = real_runtime(pair(action), 2);

    let report = with_timeout(runtime.run_target("both")).await?;

    assert!(report.is_success(), "{report}");
    assert_eq!(report.completed().len(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_slot_runs_one_task_at_a_time() -> TestResult {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let action: TaskAction = {
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        Arc::new(move || {
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(50));
            in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(())
        })
    };
    let mut runtime = real_runtime(pair(action), 1);

    let report = with_timeout(runtime.run_target("both")).await?;

    assert!(report.is_success(), "{report}");
    assert_eq!(peak.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_slot_cannot_rendezvous() -> TestResult {
    let meeting = Rendezvous::new(2, Duration::from_millis(200));
    let action: TaskAction = Arc::new(move || meeting.meet());
    let mut runtime = real_runtime(pair(action), 1);

    let report = with_timeout(runtime.run_target("both")).await?;

    assert!(!report.is_success());
    assert!(report.result_of("left").is_some_and(|r| !r.is_success()), "{report}");
    Ok(())
}
