// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - filtering raw change events through the watch globs
//! - optional content hashing, so touched-but-unchanged files are ignored
//! - the debounce/run/reload state machine ([`WatchController`]) and the
//!   async loop driving it ([`WatchSession`])
//!
//! It does **not** know how tasks run; it asks a [`TaskTrigger`] to run the
//! watched task and a [`crate::server::DevServer`] to reload.

pub mod controller;
pub mod hash;
pub mod patterns;
pub mod session;
pub mod watcher;

pub use controller::{WatchCommand, WatchController, WatchState};
pub use hash::ChangeDetector;
pub use patterns::WatchFilter;
pub use session::{TaskTrigger, WatchSession, WatchSummary};
pub use watcher::{NotifyBackend, WatchBackend, WatchSignal, WatcherHandle};
