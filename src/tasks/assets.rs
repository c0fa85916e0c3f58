// src/tasks/assets.rs

use tracing::info;

use crate::errors::TaskError;
use crate::pipeline::{Pipeline, Selection};
use crate::tasks::{ASSETS, TaskContext};

/// Static files are copied as they are. The output and intermediate
/// directories are never descended into, so a project root source cannot
/// pick up build products.
pub fn pipeline(ctx: &TaskContext) -> Pipeline {
    let cfg = ctx.config.assets();
    let selection = Selection::new(ctx.path(&cfg.source), &cfg.patterns)
        .exclude_dir(ctx.dest())
        .exclude_dir(ctx.path(&ctx.config.styles().intermediate));

    Pipeline::new(ASSETS, selection, ctx.dest_sub(&cfg.dest))
}

pub fn run(ctx: &TaskContext) -> Result<(), TaskError> {
    let written = pipeline(ctx).run(ctx.fs())?;
    info!(task = ASSETS, written, "static assets copied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use super::*;
    use crate::config::ConfigFile;
    use crate::fs::FileSystem;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn copies_html_and_icons_only() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/index.html", "<html></html>");
        fs.add_file("/p/icons/fav/32.png", "png");
        fs.add_file("/p/js/a.js", "a");
        fs.add_file("/p/dist/old.html", "stale");

        let ctx = TaskContext::new("/p", Arc::new(fs.clone()), Arc::new(ConfigFile::default()));
        run(&ctx).unwrap();

        assert_eq!(
            fs.contents_string("/p/dist/index.html").as_deref(),
            Some("<html></html>")
        );
        assert!(fs.is_file(Path::new("/p/dist/icons/fav/32.png")));
        assert!(!fs.exists(Path::new("/p/dist/js")));
        assert!(!fs.exists(Path::new("/p/dist/dist")));
    }
}
