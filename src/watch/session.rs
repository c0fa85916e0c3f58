// src/watch/session.rs

//! The async shell around [`WatchController`].
//!
//! One loop multiplexes watch signals, the debounce timer, the in-flight
//! run and the shutdown signal. Runs are strictly sequential: the trigger
//! is moved into the run future and handed back when it completes.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, error, info, warn};

use crate::config::ConfigFile;
use crate::engine::Runtime;
use crate::exec::ExecutorBackend;
use crate::fs::FileSystem;
use crate::server::DevServer;
use crate::types::WatchEvent;
use crate::watch::controller::{WatchCommand, WatchController};
use crate::watch::hash::ChangeDetector;
use crate::watch::patterns::{WatchFilter, relative_to};
use crate::watch::watcher::{WatchBackend, WatchSignal, WatcherHandle};

/// Something that can run a task to completion and say whether it worked.
pub trait TaskTrigger {
    fn run_task(&mut self, task: &str) -> impl Future<Output = bool>;
}

impl<E: ExecutorBackend> TaskTrigger for Runtime<E> {
    async fn run_task(&mut self, task: &str) -> bool {
        match self.run_target(task).await {
            Ok(report) => {
                println!("{report}");
                report.is_success()
            }
            Err(err) => {
                error!(task, %err, "watch run could not start");
                false
            }
        }
    }
}

/// What a finished session did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub runs: usize,
    pub reloads: usize,
    /// Watching was given up after the subscription could not be restored.
    pub degraded: bool,
}

type RunFuture<T> = Pin<Box<dyn Future<Output = (T, bool)>>>;

pub struct WatchSession<B: WatchBackend> {
    root: PathBuf,
    filter: WatchFilter,
    controller: WatchController,
    detector: Option<ChangeDetector>,
    backend: B,
    fs: Arc<dyn FileSystem>,
    server: Arc<dyn DevServer>,
}

impl<B: WatchBackend> WatchSession<B> {
    pub fn new(
        root: impl Into<PathBuf>,
        filter: WatchFilter,
        controller: WatchController,
        backend: B,
        fs: Arc<dyn FileSystem>,
        server: Arc<dyn DevServer>,
    ) -> Self {
        Self {
            root: root.into(),
            filter,
            controller,
            detector: None,
            backend,
            fs,
            server,
        }
    }

    /// Session for `[watch]` of `cfg`.
    pub fn from_config(
        root: impl Into<PathBuf>,
        cfg: &ConfigFile,
        backend: B,
        fs: Arc<dyn FileSystem>,
        server: Arc<dyn DevServer>,
    ) -> Result<Self> {
        let watch = cfg.watch();
        let controller =
            WatchController::new(&watch.task, Duration::from_millis(watch.debounce_ms));
        let session = Self::new(
            root,
            WatchFilter::from_config(cfg)?,
            controller,
            backend,
            fs,
            server,
        );
        Ok(if watch.use_hash {
            session.with_content_hashing()
        } else {
            session
        })
    }

    /// Ignore modifications that leave file content unchanged.
    pub fn with_content_hashing(mut self) -> Self {
        self.detector = Some(ChangeDetector::new());
        self
    }

    /// Run until `shutdown` turns true (or its sender goes away). A run in
    /// flight at that point is awaited, never abandoned.
    pub async fn run<T>(mut self, trigger: T, mut shutdown: watch::Receiver<bool>) -> WatchSummary
    where
        T: TaskTrigger + 'static,
    {
        let mut summary = WatchSummary::default();
        if *shutdown.borrow() {
            return summary;
        }
        self.prime_hashes();

        // One retry per session, whether the first subscription fails or a
        // later one is lost.
        let mut retries = 1;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut handle = self.subscribe(&tx, &mut retries, &mut summary);

        let mut trigger = Some(trigger);
        let mut in_flight: Option<RunFuture<T>> = None;
        let mut deadline: Option<Instant> = None;

        info!(
            task = self.controller.task(),
            patterns = ?self.filter.patterns(),
            "watching for changes"
        );

        loop {
            let commands = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    Vec::new()
                }
                signal = rx.recv(), if !summary.degraded => match signal {
                    Some(WatchSignal::Event(event)) => {
                        if self.accepts(&event) {
                            self.controller.on_event(Instant::now())
                        } else {
                            Vec::new()
                        }
                    }
                    Some(WatchSignal::Lost(reason)) => {
                        warn!(%reason, "watch subscription lost");
                        drop(handle.take());
                        if retries == 0 {
                            self.degrade(&mut summary);
                        } else {
                            retries -= 1;
                            handle = self.subscribe(&tx, &mut retries, &mut summary);
                            if handle.is_some() {
                                info!("watch subscription restored");
                            }
                        }
                        Vec::new()
                    }
                    None => Vec::new(),
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    self.controller.on_timer(Instant::now())
                }
                (returned, success) = run_or_pending(&mut in_flight) => {
                    in_flight = None;
                    trigger = Some(returned);
                    self.controller.on_run_finished(success, Instant::now())
                }
            };

            for command in commands {
                match command {
                    WatchCommand::ScheduleTimer(at) => deadline = Some(at),
                    WatchCommand::RunTask(task) => {
                        let Some(mut t) = trigger.take() else {
                            warn!(%task, "run requested while another is in flight");
                            continue;
                        };
                        summary.runs += 1;
                        info!(%task, run = summary.runs, "change detected; rebuilding");
                        in_flight = Some(Box::pin(async move {
                            let success = t.run_task(&task).await;
                            (t, success)
                        }));
                    }
                    WatchCommand::Reload => {
                        summary.reloads += 1;
                        self.server.reload();
                    }
                }
            }
        }

        if let Some(run) = in_flight.take() {
            info!("waiting for the running build to finish");
            run.await;
        }
        drop(handle);

        debug!(?summary, "watch session ended");
        summary
    }

    /// Subscribe, spending retries on failures. Out of retries, watching
    /// is given up.
    fn subscribe(
        &mut self,
        tx: &mpsc::UnboundedSender<WatchSignal>,
        retries: &mut u32,
        summary: &mut WatchSummary,
    ) -> Option<WatcherHandle> {
        loop {
            match self.backend.subscribe(&self.root, tx.clone()) {
                Ok(handle) => return Some(handle),
                Err(err) => warn!(%err, "watch subscription failed"),
            }
            if *retries == 0 {
                break;
            }
            *retries -= 1;
        }
        self.degrade(summary);
        None
    }

    fn degrade(&self, summary: &mut WatchSummary) {
        warn!("file watching disabled; the server keeps serving, rebuild manually");
        summary.degraded = true;
    }

    fn accepts(&mut self, event: &WatchEvent) -> bool {
        let Some(rel) = relative_to(&self.root, &event.path) else {
            return false;
        };
        if !self.filter.matches(&rel) {
            return false;
        }
        if let Some(detector) = self.detector.as_mut()
            && !detector.changed(self.fs.as_ref(), &event.path, event.kind)
        {
            return false;
        }
        debug!(path = %rel, kind = %event.kind, "watched file changed");
        true
    }

    fn prime_hashes(&mut self) {
        let Some(detector) = self.detector.as_mut() else {
            return;
        };
        match self.filter.selection(&self.root).select(self.fs.as_ref()) {
            Ok(files) => detector.prime(self.fs.as_ref(), files.into_iter().map(|f| f.origin)),
            Err(err) => warn!(%err, "could not hash watched files"),
        }
    }
}

impl<B: WatchBackend> std::fmt::Debug for WatchSession<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSession")
            .field("root", &self.root)
            .field("filter", &self.filter)
            .field("controller", &self.controller)
            .finish_non_exhaustive()
    }
}

async fn run_or_pending<T>(in_flight: &mut Option<RunFuture<T>>) -> (T, bool) {
    match in_flight.as_mut() {
        Some(run) => run.await,
        None => std::future::pending().await,
    }
}
