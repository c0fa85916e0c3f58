// tests/watch_session.rs

mod common;
use crate::common::init_tracing;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use assetdag::fs::mock::MockFileSystem;
use assetdag::watch::{WatchController, WatchFilter, WatchSession, WatchSignal, WatchSummary};
use assetdag_test_utils::fake_watch::{FakeTrigger, FakeWatchBackend, RecordingReload, modified};
use tokio::sync::watch;
use tokio::time::{Instant, sleep};

const ROOT: &str = "/site";
const DEBOUNCE: Duration = Duration::from_millis(200);

struct Harness {
    backend: FakeWatchBackend,
    reload: RecordingReload,
    fs: MockFileSystem,
    hashing: bool,
}

impl Harness {
    fn new(backend: FakeWatchBackend) -> Self {
        Self {
            backend,
            reload: RecordingReload::new(),
            fs: MockFileSystem::new(),
            hashing: false,
        }
    }

    fn hashing(mut self) -> Self {
        self.hashing = true;
        self
    }

    /// Run a session next to `script`; the session is stopped once the
    /// script returns.
    async fn run<F>(&self, trigger: FakeTrigger, script: F) -> WatchSummary
    where
        F: Future<Output = ()>,
    {
        let filter = WatchFilter::new(&["sass/**/*.scss".to_string()], &["dist".to_string()])
            .expect("valid watch globs");
        let mut session = WatchSession::new(
            ROOT,
            filter,
            WatchController::new("styles", DEBOUNCE),
            self.backend.clone(),
            Arc::new(self.fs.clone()),
            Arc::new(self.reload.clone()),
        );
        if self.hashing {
            session = session.with_content_hashing();
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let stopper = async move {
            script.await;
            let _ = stop_tx.send(true);
        };
        let (summary, ()) = tokio::join!(session.run(trigger, stop_rx), stopper);
        summary
    }
}

fn scss(name: &str) -> WatchSignal {
    modified(format!("{ROOT}/sass/{name}"))
}

#[tokio::test(start_paused = true)]
async fn burst_of_changes_runs_once_and_reloads_once() {
    init_tracing();
    let backend = FakeWatchBackend::new().then_deliver(vec![
        scss("a.scss"),
        scss("b.scss"),
        scss("a.scss"),
    ]);
    let harness = Harness::new(backend);
    let trigger = FakeTrigger::new(true);

    let summary = harness
        .run(trigger.clone(), sleep(Duration::from_secs(5)))
        .await;

    assert_eq!(trigger.runs(), vec!["styles"]);
    assert_eq!(summary.runs, 1);
    assert_eq!(summary.reloads, 1);
    assert_eq!(harness.reload.count(), 1);
    assert!(!summary.degraded);
}

#[tokio::test(start_paused = true)]
async fn changes_during_a_run_queue_one_more_run() {
    let backend = FakeWatchBackend::new().then_deliver(vec![scss("a.scss")]);
    let harness = Harness::new(backend.clone());
    let trigger = FakeTrigger::new(true).taking(Duration::from_secs(1));

    let script = async {
        // The run starts once the window closes and lasts a second.
        sleep(Duration::from_millis(300)).await;
        backend.emit(scss("a.scss"));
        sleep(Duration::from_millis(100)).await;
        backend.emit(scss("b.scss"));
        sleep(Duration::from_secs(5)).await;
    };
    let summary = harness.run(trigger.clone(), script).await;

    assert_eq!(trigger.runs().len(), 2);
    assert_eq!(summary.reloads, 2);
}

#[tokio::test(start_paused = true)]
async fn unwatched_paths_are_ignored() {
    let backend = FakeWatchBackend::new().then_deliver(vec![
        modified(format!("{ROOT}/js/app.js")),
        modified(format!("{ROOT}/dist/sass/copy.scss")),
        modified("/elsewhere/sass/a.scss"),
    ]);
    let harness = Harness::new(backend);
    let trigger = FakeTrigger::new(true);

    let summary = harness
        .run(trigger.clone(), sleep(Duration::from_secs(2)))
        .await;

    assert!(trigger.runs().is_empty());
    assert_eq!(summary, WatchSummary::default());
}

#[tokio::test(start_paused = true)]
async fn failed_run_does_not_reload() {
    let backend = FakeWatchBackend::new().then_deliver(vec![scss("a.scss")]);
    let harness = Harness::new(backend);
    let trigger = FakeTrigger::new(false);

    let summary = harness
        .run(trigger.clone(), sleep(Duration::from_secs(2)))
        .await;

    assert_eq!(summary.runs, 1);
    assert_eq!(summary.reloads, 0);
    assert_eq!(harness.reload.count(), 0);
}

#[tokio::test(start_paused = true)]
async fn lost_subscription_is_restored_once() {
    init_tracing();
    let backend = FakeWatchBackend::new();
    let harness = Harness::new(backend.clone());
    let trigger = FakeTrigger::new(true);

    let script = async {
        sleep(Duration::from_millis(50)).await;
        backend.emit(WatchSignal::Lost("inotify queue overflow".into()));
        sleep(Duration::from_millis(50)).await;
        backend.emit(scss("a.scss"));
        sleep(Duration::from_secs(2)).await;
    };
    let summary = harness.run(trigger.clone(), script).await;

    assert_eq!(backend.subscriptions(), 2);
    assert!(!summary.degraded);
    assert_eq!(summary.runs, 1);
}

#[tokio::test(start_paused = true)]
async fn second_loss_degrades_to_serving_only() {
    let backend = FakeWatchBackend::new();
    let harness = Harness::new(backend.clone());
    let trigger = FakeTrigger::new(true);

    let script = async {
        sleep(Duration::from_millis(50)).await;
        backend.emit(WatchSignal::Lost("gone".into()));
        sleep(Duration::from_millis(50)).await;
        backend.emit(WatchSignal::Lost("gone again".into()));
        sleep(Duration::from_millis(50)).await;
        backend.emit(scss("a.scss"));
        sleep(Duration::from_secs(2)).await;
    };
    let summary = harness.run(trigger.clone(), script).await;

    assert_eq!(backend.subscriptions(), 2);
    assert!(summary.degraded);
    assert!(trigger.runs().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failing_subscription_is_retried_then_given_up() {
    let backend = FakeWatchBackend::new()
        .then_fail("no watches left")
        .then_fail("still none");
    let harness = Harness::new(backend.clone());

    let summary = harness
        .run(FakeTrigger::new(true), sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(backend.subscriptions(), 2);
    assert!(summary.degraded);
}

#[tokio::test(start_paused = true)]
async fn shutdown_waits_for_the_running_build() {
    let backend = FakeWatchBackend::new().then_deliver(vec![scss("a.scss")]);
    let harness = Harness::new(backend);
    let trigger = FakeTrigger::new(true).taking(Duration::from_secs(1));

    let started = Instant::now();
    let summary = harness
        .run(trigger.clone(), sleep(Duration::from_millis(300)))
        .await;

    assert_eq!(summary.runs, 1);
    assert!(started.elapsed() >= DEBOUNCE + Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn content_hashing_ignores_touches() {
    let backend = FakeWatchBackend::new();
    let harness = Harness::new(backend.clone()).hashing();
    harness.fs.add_file("/site/sass/a.scss", "a { color: red; }");
    let trigger = FakeTrigger::new(true);

    let script = async {
        sleep(Duration::from_millis(50)).await;
        backend.emit(scss("a.scss"));
        sleep(Duration::from_millis(500)).await;
        harness.fs.add_file("/site/sass/a.scss", "a { color: blue; }");
        backend.emit(scss("a.scss"));
        sleep(Duration::from_secs(2)).await;
    };
    let summary = harness.run(trigger.clone(), script).await;

    assert_eq!(trigger.runs().len(), 1);
    assert_eq!(summary.reloads, 1);
}
