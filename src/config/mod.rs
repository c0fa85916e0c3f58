// src/config/mod.rs

//! Configuration loading and validation for assetdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk, or fall back to defaults (`loader.rs`).
//! - Validate globs, file names and task shapes (`validate.rs`).
//!
//! Dependency errors between tasks (unknown names, cycles) are reported by
//! the task registry when the tasks are registered.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default, project_root};
pub use model::{ConfigFile, RawConfigFile, TaskConfig};
