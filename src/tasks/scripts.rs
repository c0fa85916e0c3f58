// src/tasks/scripts.rs

use tracing::info;

use crate::errors::TaskError;
use crate::pipeline::{Concat, Minify, Pipeline, Selection, SourceMapInit, SourceMapWrite};
use crate::tasks::{SCRIPTS, TaskContext};

/// `js/**/*.js` → concatenate → minify → `dist/js/all.min.js` (+ map).
pub fn pipeline(ctx: &TaskContext) -> Pipeline {
    let cfg = ctx.config.scripts();
    let selection = Selection::new(ctx.path(&cfg.source), &cfg.patterns);

    let mut pipeline = Pipeline::new(SCRIPTS, selection, ctx.dest_sub(&cfg.dest));
    if cfg.source_maps {
        pipeline = pipeline.stage(SourceMapInit);
    }
    pipeline = pipeline
        .stage(Concat::new(&cfg.bundle))
        .stage(Minify::new(ctx.toolchain.scripts.clone()));
    if cfg.source_maps {
        pipeline = pipeline.stage(SourceMapWrite);
    }
    pipeline
}

pub fn run(ctx: &TaskContext) -> Result<(), TaskError> {
    let written = pipeline(ctx).run(ctx.fs())?;
    info!(task = SCRIPTS, written, "scripts bundled");
    Ok(())
}
