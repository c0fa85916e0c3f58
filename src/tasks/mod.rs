// src/tasks/mod.rs

//! The standard asset tasks.
//!
//! Each task is a plain function over a [`TaskContext`]; the facade wraps
//! them into registry actions.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ConfigFile;
use crate::fs::FileSystem;
use crate::pipeline::join_rel;
use crate::transform::Toolchain;

pub mod assets;
pub mod clean;
pub mod images;
pub mod scripts;
pub mod styles;

pub const CLEAN: &str = "clean";
pub const SCRIPTS: &str = "scripts";
pub const STYLES: &str = "styles";
pub const IMAGES: &str = "images";
pub const ASSETS: &str = "assets";
pub const BUILD: &str = "build";

/// Everything a task action needs. Shared by all actions of one process.
#[derive(Debug, Clone)]
pub struct TaskContext {
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub toolchain: Toolchain,
    pub config: Arc<ConfigFile>,
}

impl TaskContext {
    /// Context with the standard toolchain.
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn FileSystem>, config: Arc<ConfigFile>) -> Self {
        let toolchain = Toolchain::standard(config.images().jpeg_quality);
        Self {
            root: root.into(),
            fs,
            toolchain,
            config,
        }
    }

    pub fn with_toolchain(mut self, toolchain: Toolchain) -> Self {
        self.toolchain = toolchain;
        self
    }

    /// A configured path, resolved against the project root.
    pub fn path(&self, rel: &str) -> PathBuf {
        join_rel(&self.root, rel)
    }

    /// The output directory.
    pub fn dest(&self) -> PathBuf {
        self.path(&self.config.paths().dest)
    }

    /// A subdirectory of the output directory.
    pub fn dest_sub(&self, rel: &str) -> PathBuf {
        join_rel(&self.dest(), rel)
    }

    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }
}

