// src/tasks/clean.rs

use tracing::{debug, info};

use crate::errors::TaskError;
use crate::tasks::TaskContext;

/// Delete every top-level child of the output directory, keeping the
/// directory itself. Only metadata is consulted; file contents are never
/// read. A missing output directory is fine.
pub fn run(ctx: &TaskContext) -> Result<(), TaskError> {
    let fs = ctx.fs();
    let dest = ctx.dest();

    if !fs.is_dir(&dest) {
        debug!(dest = %dest.display(), "output directory missing; nothing to clean");
        return Ok(());
    }

    let mut children = fs.read_dir(&dest).map_err(|e| TaskError::io(&dest, e))?;
    children.sort();

    for child in &children {
        let removed = if fs.is_dir(child) {
            fs.remove_dir_all(child)
        } else {
            fs.remove_file(child)
        };
        match removed {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(TaskError::io(child, e)),
        }
    }

    info!(dest = %dest.display(), removed = children.len(), "cleaned");
    Ok(())
}
