// src/pipeline/select.rs

use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::debug;

use crate::errors::{StageError, TaskError};
use crate::fs::FileSystem;
use crate::pipeline::fileset::{FileSet, VirtualFile, slash_path};

/// Which files a pipeline starts from.
///
/// Patterns are relative to `base`. `*` never crosses a `/`, so `*.css`
/// only matches top-level files while `**/*.scss` matches at any depth.
#[derive(Debug, Clone)]
pub struct Selection {
    base: PathBuf,
    patterns: Vec<String>,
    exclude_dirs: Vec<PathBuf>,
    read_contents: bool,
}

impl Selection {
    pub fn new(base: impl Into<PathBuf>, patterns: &[String]) -> Self {
        Self {
            base: base.into(),
            patterns: patterns.to_vec(),
            exclude_dirs: Vec::new(),
            read_contents: true,
        }
    }

    /// Never descend into `dir` (absolute, or relative to the base).
    pub fn exclude_dir(mut self, dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            self.base.join(dir)
        };
        self.exclude_dirs.push(dir);
        self
    }

    /// Select paths only; contents stay empty.
    pub fn metadata_only(mut self) -> Self {
        self.read_contents = false;
        self
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Expand the patterns: depth-first, entries sorted at every directory
    /// level. A missing base directory selects nothing.
    pub fn select(&self, fs: &dyn FileSystem) -> Result<FileSet, TaskError> {
        let globs = build_globset(&self.patterns)?;
        let max_depth = self.max_depth();

        let mut files = FileSet::new();
        if fs.is_dir(&self.base) {
            self.walk(fs, &globs, &self.base, 1, max_depth, &mut files)?;
        }

        debug!(
            base = %self.base.display(),
            patterns = ?self.patterns,
            selected = files.len(),
            "selected files"
        );
        Ok(files)
    }

    fn walk(
        &self,
        fs: &dyn FileSystem,
        globs: &GlobSet,
        dir: &Path,
        depth: usize,
        max_depth: Option<usize>,
        out: &mut FileSet,
    ) -> Result<(), TaskError> {
        let mut entries = fs.read_dir(dir).map_err(|e| TaskError::io(dir, e))?;
        entries.sort();

        for path in entries {
            if fs.is_dir(&path) {
                let within_depth = max_depth.is_none_or(|max| depth < max);
                if within_depth && !self.exclude_dirs.iter().any(|d| d == &path) {
                    self.walk(fs, globs, &path, depth + 1, max_depth, out)?;
                }
                continue;
            }

            let Ok(rel) = path.strip_prefix(&self.base) else {
                continue;
            };
            if !globs.is_match(slash_path(rel)) {
                continue;
            }

            let contents = if self.read_contents {
                fs.read(&path).map_err(|e| TaskError::io(&path, e))?
            } else {
                Vec::new()
            };
            out.push(VirtualFile::new(rel, &path, contents));
        }
        Ok(())
    }

    /// How many directory levels a pattern can reach; `None` when a pattern
    /// contains `**`.
    fn max_depth(&self) -> Option<usize> {
        let mut max = 0;
        for pattern in &self.patterns {
            if pattern.contains("**") {
                return None;
            }
            max = max.max(pattern.split('/').count());
        }
        Some(max)
    }
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, StageError> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .map_err(|e| StageError::new("select", format!("invalid glob pattern {pat}: {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| StageError::new("select", e.to_string()))
}
