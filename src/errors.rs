// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ConfigError`]: a bad task graph. Fatal, raised before anything runs.
//! - [`TaskError`]: a failure inside one task (stage, IO, command). Always
//!   contained in that task's `BuildResult`.
//! - [`AssetdagError`]: everything that can abort the process.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown task '{name}' (available: {available})")]
    Usage { name: String, available: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Problems with the task graph itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("task '{0}' is already registered")]
    DuplicateTask(TaskName),

    #[error("task '{task}' depends on unknown task '{dependency}'")]
    UnknownDependency { task: TaskName, dependency: TaskName },

    #[error("task '{0}' not found")]
    NotFound(TaskName),

    #[error("[watch].task names unknown task '{0}'")]
    UnknownWatchTask(TaskName),

    #[error("cyclic dependency between tasks: {}", .members.join(" -> "))]
    CyclicDependency { members: Vec<TaskName> },

    #[error("composite task '{0}' needs at least one non-empty stage")]
    EmptySeries(TaskName),
}

/// Coarse classification of a [`TaskError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Stage,
    Io,
    Command,
    Panic,
}

/// A task-local failure.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Stage(#[from] StageError),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("command `{cmd}` exited with status {code}")]
    Command { cmd: String, code: i32 },

    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskError::Stage(_) => ErrorKind::Stage,
            TaskError::Io { .. } => ErrorKind::Io,
            TaskError::Command { .. } => ErrorKind::Command,
            TaskError::Panicked(_) => ErrorKind::Panic,
        }
    }
}

/// A pipeline stage failed, e.g. a stylesheet did not compile.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct StageError {
    pub stage: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    pub message: String,
}

impl StageError {
    pub fn new(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            file: None,
            line: None,
            column: None,
            message: message.into(),
        }
    }

    pub fn in_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn at(mut self, line: Option<u32>, column: Option<u32>) -> Self {
        self.line = line;
        self.column = column;
        self
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' failed", self.stage)?;
        if let Some(file) = &self.file {
            write!(f, " in {}", file.display())?;
            match (self.line, self.column) {
                (Some(line), Some(col)) => write!(f, ":{line}:{col}")?,
                (Some(line), None) => write!(f, ":{line}")?,
                _ => {}
            }
        }
        write!(f, ": {}", self.message)
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_error_display_includes_location() {
        let err = StageError::new("preprocess", "expected \"}\".")
            .in_file("sass/global.scss")
            .at(Some(3), Some(14));
        assert_eq!(
            err.to_string(),
            "stage 'preprocess' failed in sass/global.scss:3:14: expected \"}\"."
        );
    }

    #[test]
    fn cyclic_dependency_names_members() {
        let err = ConfigError::CyclicDependency {
            members: vec!["a".into(), "b".into(), "c".into()],
        };
        assert_eq!(err.to_string(), "cyclic dependency between tasks: a -> b -> c");
    }
}
