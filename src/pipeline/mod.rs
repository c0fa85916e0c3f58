// src/pipeline/mod.rs

//! File pipelines: select → stages → write.
//!
//! A [`Pipeline`] never writes anything when its selection is empty; that
//! is a successful no-op so optional asset categories can stay absent.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::TaskError;
use crate::fs::FileSystem;

pub mod fileset;
pub mod select;
pub mod sourcemap;
pub mod stages;

pub use fileset::{FileSet, VirtualFile};
pub use select::Selection;
pub use sourcemap::SourceMap;
pub use stages::{Concat, Minify, Optimize, Preprocess, SourceMapInit, SourceMapWrite, Stage};

pub struct Pipeline {
    name: &'static str,
    selection: Selection,
    stages: Vec<Box<dyn Stage>>,
    dest: PathBuf,
}

impl Pipeline {
    pub fn new(name: &'static str, selection: Selection, dest: impl Into<PathBuf>) -> Self {
        Self {
            name,
            selection,
            stages: Vec::new(),
            dest: dest.into(),
        }
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run to completion, returning the number of files written.
    pub fn run(&self, fs: &dyn FileSystem) -> Result<usize, TaskError> {
        let mut files = self.selection.select(fs)?;
        if files.is_empty() {
            debug!(
                pipeline = self.name,
                base = %self.selection.base().display(),
                "empty selection; nothing to do"
            );
            return Ok(0);
        }

        for stage in &self.stages {
            files = stage.apply(fs, files)?;
            debug!(
                pipeline = self.name,
                stage = stage.name(),
                files = files.len(),
                "stage finished"
            );
        }

        write_to_dest(fs, &files, &self.dest)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("name", &self.name)
            .field("selection", &self.selection)
            .field("stages", &self.stage_names())
            .field("dest", &self.dest)
            .finish()
    }
}

/// Write every file below `dest`, preserving relative paths.
pub fn write_to_dest(fs: &dyn FileSystem, files: &FileSet, dest: &Path) -> Result<usize, TaskError> {
    for file in files {
        let target = dest.join(&file.path);
        fs.write(&target, &file.contents)
            .map_err(|e| TaskError::io(&target, e))?;
    }
    debug!(dest = %dest.display(), written = files.len(), "wrote files");
    Ok(files.len())
}

/// `base/rel`, or `base` itself for an empty or `.` relative path.
pub fn join_rel(base: &Path, rel: &str) -> PathBuf {
    match rel.trim_matches('/') {
        "" | "." => base.to_path_buf(),
        rel => base.join(rel),
    }
}
