use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use assetdag::server::DevServer;
use assetdag::types::{ChangeKind, WatchEvent};
use assetdag::watch::{TaskTrigger, WatchBackend, WatchSignal, WatcherHandle};
use tokio::sync::mpsc::UnboundedSender;

enum Script {
    Deliver(Vec<WatchSignal>),
    Fail(String),
}

/// Scripted watch backend. Each `subscribe` call consumes the next script
/// entry; with none left it subscribes silently. Clones share state.
#[derive(Clone, Default)]
pub struct FakeWatchBackend {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    sink: Arc<Mutex<Option<UnboundedSender<WatchSignal>>>>,
    subscriptions: Arc<AtomicUsize>,
}

impl FakeWatchBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next subscription delivers `signals` right away.
    pub fn then_deliver(self, signals: Vec<WatchSignal>) -> Self {
        self.scripts.lock().unwrap().push_back(Script::Deliver(signals));
        self
    }

    /// The next subscription attempt fails.
    pub fn then_fail(self, reason: &str) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .push_back(Script::Fail(reason.to_string()));
        self
    }

    /// Send a signal on the current subscription.
    pub fn emit(&self, signal: WatchSignal) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            let _ = sink.send(signal);
        }
    }

    pub fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl WatchBackend for FakeWatchBackend {
    fn subscribe(
        &mut self,
        _root: &Path,
        sink: UnboundedSender<WatchSignal>,
    ) -> anyhow::Result<WatcherHandle> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(Script::Fail(reason)) => return Err(anyhow!(reason)),
            Some(Script::Deliver(signals)) => {
                for signal in signals {
                    let _ = sink.send(signal);
                }
            }
            None => {}
        }
        *self.sink.lock().unwrap() = Some(sink);
        Ok(WatcherHandle::detached())
    }
}

/// A modification event for `path`.
pub fn modified(path: impl AsRef<Path>) -> WatchSignal {
    WatchSignal::Event(WatchEvent::new(path.as_ref(), ChangeKind::Modified))
}

/// Counts reload requests.
#[derive(Clone, Default)]
pub struct RecordingReload {
    count: Arc<AtomicUsize>,
}

impl RecordingReload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl DevServer for RecordingReload {
    fn reload(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records the tasks it was asked to run; every run takes `duration` and
/// reports `success`.
#[derive(Clone)]
pub struct FakeTrigger {
    runs: Arc<Mutex<Vec<String>>>,
    duration: Duration,
    success: bool,
}

impl FakeTrigger {
    pub fn new(success: bool) -> Self {
        Self {
            runs: Arc::new(Mutex::new(Vec::new())),
            duration: Duration::ZERO,
            success,
        }
    }

    pub fn taking(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn runs(&self) -> Vec<String> {
        self.runs.lock().unwrap().clone()
    }
}

impl TaskTrigger for FakeTrigger {
    async fn run_task(&mut self, task: &str) -> bool {
        self.runs.lock().unwrap().push(task.to_string());
        if !self.duration.is_zero() {
            tokio::time::sleep(self.duration).await;
        }
        self.success
    }
}
