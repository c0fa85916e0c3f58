// src/watch/patterns.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::ConfigFile;
use crate::pipeline::Selection;
use crate::pipeline::fileset::slash_path;
use crate::pipeline::select::build_globset;

/// Decides which changed paths are interesting.
///
/// Patterns are relative to the project root. Build products (the output
/// and intermediate directories) never match, otherwise every rebuild
/// would trigger the next one.
#[derive(Clone)]
pub struct WatchFilter {
    patterns: Vec<String>,
    globs: GlobSet,
    excluded_dirs: Vec<String>,
}

impl fmt::Debug for WatchFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchFilter")
            .field("patterns", &self.patterns)
            .field("excluded_dirs", &self.excluded_dirs)
            .finish_non_exhaustive()
    }
}

impl WatchFilter {
    pub fn new(patterns: &[String], excluded_dirs: &[String]) -> Result<Self> {
        let globs = build_globset(patterns)
            .with_context(|| format!("building watch globset from {patterns:?}"))?;
        let excluded_dirs = excluded_dirs
            .iter()
            .map(|d| d.trim_matches('/').to_string())
            .filter(|d| !d.is_empty() && d != ".")
            .collect();

        Ok(Self {
            patterns: patterns.to_vec(),
            globs,
            excluded_dirs,
        })
    }

    /// `[watch].patterns`, excluding `paths.dest` and the styles
    /// intermediate directory.
    pub fn from_config(cfg: &ConfigFile) -> Result<Self> {
        Self::new(
            &cfg.watch().patterns,
            &[cfg.paths().dest.clone(), cfg.styles().intermediate.clone()],
        )
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Whether a root-relative, slash-separated path should trigger a run.
    pub fn matches(&self, rel_path: &str) -> bool {
        !self.is_excluded(rel_path) && self.globs.is_match(rel_path)
    }

    fn is_excluded(&self, rel_path: &str) -> bool {
        self.excluded_dirs.iter().any(|dir| {
            rel_path
                .strip_prefix(dir.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Every file currently matching, as a selection over `root`.
    pub fn selection(&self, root: &Path) -> Selection {
        self.excluded_dirs
            .iter()
            .fold(Selection::new(root, &self.patterns), |sel, dir| {
                sel.exclude_dir(dir)
            })
            .metadata_only()
    }
}

/// `path` relative to `root`, slash-separated.
///
/// Watch backends may report canonical paths for a root given through a
/// symlink (macOS `/private/var/...`), so a failed prefix strip is retried
/// on canonical forms.
pub fn relative_to(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(slash_path(rel));
    }

    let root = root.canonicalize().ok()?;
    let path = path.canonicalize().ok()?;
    path.strip_prefix(&root).ok().map(slash_path)
}
