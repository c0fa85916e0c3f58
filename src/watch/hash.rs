// src/watch/hash.rs

//! Content hashing for `[watch].use_hash`.
//!
//! Editors and tools often touch files without changing them. With hashing
//! enabled a `Modified` event only counts when the blake3 digest of the
//! file differs from the last one seen.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use blake3::Hash;
use tracing::debug;

use crate::fs::FileSystem;
use crate::types::ChangeKind;

/// Hash a single file.
pub fn hash_file(fs: &dyn FileSystem, path: &Path) -> io::Result<Hash> {
    let bytes = fs.read(path)?;
    Ok(blake3::hash(&bytes))
}

/// Last known content hash per watched file. Memory only.
#[derive(Debug, Default)]
pub struct ChangeDetector {
    hashes: HashMap<PathBuf, Hash>,
}

impl ChangeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current content of `paths` without reporting changes.
    /// Unreadable files are skipped.
    pub fn prime<I>(&mut self, fs: &dyn FileSystem, paths: I)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            if let Ok(hash) = hash_file(fs, &path) {
                self.hashes.insert(path, hash);
            }
        }
        debug!(files = self.hashes.len(), "primed content hashes");
    }

    /// Whether an event represents a real content change, updating the
    /// stored hash as a side effect.
    ///
    /// Additions and removals always count. A file that cannot be read
    /// counts as changed; the task will report the actual problem.
    pub fn changed(&mut self, fs: &dyn FileSystem, path: &Path, kind: ChangeKind) -> bool {
        if kind == ChangeKind::Removed {
            self.hashes.remove(path);
            return true;
        }

        let Ok(hash) = hash_file(fs, path) else {
            self.hashes.remove(path);
            return true;
        };

        match self.hashes.insert(path.to_path_buf(), hash) {
            Some(previous) if previous == hash && kind == ChangeKind::Modified => {
                debug!(path = %path.display(), "content unchanged");
                false
            }
            _ => true,
        }
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn touch_without_change_is_ignored() {
        let fs = MockFileSystem::new();
        let path = Path::new("/p/sass/x.scss");
        fs.add_file(path, "a {}");

        let mut detector = ChangeDetector::new();
        detector.prime(&fs, [path.to_path_buf()]);
        assert!(!detector.changed(&fs, path, ChangeKind::Modified));

        fs.add_file(path, "b {}");
        assert!(detector.changed(&fs, path, ChangeKind::Modified));
        assert!(!detector.changed(&fs, path, ChangeKind::Modified));
    }

    #[test]
    fn unknown_and_removed_files_count() {
        let fs = MockFileSystem::new();
        let path = Path::new("/p/sass/new.scss");
        fs.add_file(path, "a {}");

        let mut detector = ChangeDetector::new();
        assert!(detector.changed(&fs, path, ChangeKind::Modified));
        assert!(detector.changed(&fs, path, ChangeKind::Removed));
        assert!(detector.is_empty());
        assert!(detector.changed(&fs, Path::new("/p/missing.scss"), ChangeKind::Modified));
    }
}
