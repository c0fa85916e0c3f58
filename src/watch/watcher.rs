// src/watch/watcher.rs

use std::any::Any;
use std::path::Path;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;

use crate::types::{ChangeKind, WatchEvent};

/// What a watch backend delivers.
#[derive(Debug, Clone)]
pub enum WatchSignal {
    Event(WatchEvent),
    /// The subscription broke; no further events will arrive on it.
    Lost(String),
}

/// Keeps a subscription alive. Dropping it stops watching.
pub struct WatcherHandle {
    _inner: Option<Box<dyn Any + Send>>,
}

impl WatcherHandle {
    pub fn new(inner: impl Any + Send) -> Self {
        Self {
            _inner: Some(Box::new(inner)),
        }
    }

    /// A handle with nothing to keep alive.
    pub fn detached() -> Self {
        Self { _inner: None }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// File-watch collaborator.
pub trait WatchBackend {
    /// Watch `root` recursively, delivering signals into `sink`.
    fn subscribe(&mut self, root: &Path, sink: UnboundedSender<WatchSignal>)
    -> Result<WatcherHandle>;
}

/// Backend over `notify`'s recommended platform watcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct NotifyBackend;

impl WatchBackend for NotifyBackend {
    fn subscribe(
        &mut self,
        root: &Path,
        sink: UnboundedSender<WatchSignal>,
    ) -> Result<WatcherHandle> {
        // Called synchronously on notify's own thread.
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let Some(kind) = ChangeKind::from_notify(&event.kind) else {
                    return;
                };
                for path in event.paths {
                    // A closed sink means the session is gone.
                    let _ = sink.send(WatchSignal::Event(WatchEvent::new(path, kind)));
                }
            }
            Err(err) => {
                let _ = sink.send(WatchSignal::Lost(err.to_string()));
            }
        };

        let mut watcher = RecommendedWatcher::new(handler, Config::default())
            .context("creating file watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("watching {}", root.display()))?;

        info!(root = %root.display(), "file watcher started");
        Ok(WatcherHandle::new(watcher))
    }
}
