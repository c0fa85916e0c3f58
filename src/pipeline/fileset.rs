// src/pipeline/fileset.rs

use std::path::{Path, PathBuf};

use crate::errors::StageError;
use crate::pipeline::sourcemap::SourceMap;

/// A file travelling through a pipeline.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    /// Path relative to the selection base; also the path below the
    /// destination directory.
    pub path: PathBuf,
    /// Where the file came from on disk.
    pub origin: PathBuf,
    pub contents: Vec<u8>,
    pub source_map: Option<SourceMap>,
}

impl VirtualFile {
    pub fn new(path: impl Into<PathBuf>, origin: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            origin: origin.into(),
            contents,
            source_map: None,
        }
    }

    /// Contents as UTF-8 text.
    pub fn text(&self, stage: &str) -> Result<&str, StageError> {
        std::str::from_utf8(&self.contents).map_err(|e| {
            StageError::new(stage, format!("file is not valid UTF-8: {e}")).in_file(&self.origin)
        })
    }

    pub fn set_text(&mut self, text: String) {
        self.contents = text.into_bytes();
    }

    /// Path with forward slashes, as used in source maps.
    pub fn display_path(&self) -> String {
        slash_path(&self.path)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Ordered sequence of files. Order matches glob expansion.
#[derive(Debug, Clone, Default)]
pub struct FileSet {
    files: Vec<VirtualFile>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, file: VirtualFile) {
        self.files.push(file);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VirtualFile> {
        self.files.iter()
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&VirtualFile> {
        self.files.iter().find(|f| f.path == path.as_ref())
    }

    /// Relative paths, in order.
    pub fn paths(&self) -> Vec<String> {
        self.files.iter().map(VirtualFile::display_path).collect()
    }
}

impl From<Vec<VirtualFile>> for FileSet {
    fn from(files: Vec<VirtualFile>) -> Self {
        Self { files }
    }
}

impl FromIterator<VirtualFile> for FileSet {
    fn from_iter<I: IntoIterator<Item = VirtualFile>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for FileSet {
    type Item = VirtualFile;
    type IntoIter = std::vec::IntoIter<VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.into_iter()
    }
}

impl<'a> IntoIterator for &'a FileSet {
    type Item = &'a VirtualFile;
    type IntoIter = std::slice::Iter<'a, VirtualFile>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.iter()
    }
}

/// `a\b` → `a/b`.
pub fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
