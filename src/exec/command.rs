// src/exec/command.rs

//! Shell command actions for `[task.<name>] cmd = "..."`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::debug;

use crate::dag::TaskAction;
use crate::errors::TaskError;

/// Wrap a shell command into a task action run from `cwd`.
pub fn shell_action(cmd: impl Into<String>, cwd: impl Into<PathBuf>) -> TaskAction {
    let cmd = cmd.into();
    let cwd = cwd.into();
    Arc::new(move || run_shell(&cmd, &cwd))
}

/// Run `cmd` through the platform shell and wait for it.
///
/// Output is inherited so the user sees it directly.
pub fn run_shell(cmd: &str, cwd: &Path) -> Result<(), TaskError> {
    // Build a shell command appropriate for the platform.
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    debug!(cmd, cwd = %cwd.display(), "spawning shell command");

    let status = command
        .current_dir(cwd)
        .status()
        .map_err(|e| TaskError::io(cwd, e))?;

    if status.success() {
        Ok(())
    } else {
        Err(TaskError::Command {
            cmd: cmd.to_string(),
            code: status.code().unwrap_or(-1),
        })
    }
}
