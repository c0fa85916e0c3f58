// src/tasks/images.rs

use tracing::info;

use crate::errors::TaskError;
use crate::pipeline::{Optimize, Pipeline, Selection};
use crate::tasks::{IMAGES, TaskContext};

pub fn pipeline(ctx: &TaskContext) -> Pipeline {
    let cfg = ctx.config.images();
    Pipeline::new(
        IMAGES,
        Selection::new(ctx.path(&cfg.source), &cfg.patterns),
        ctx.dest_sub(&cfg.dest),
    )
    .stage(Optimize::new(ctx.toolchain.images.clone()))
}

/// Optimize raster images into `dist/content`.
pub fn run(ctx: &TaskContext) -> Result<(), TaskError> {
    let written = pipeline(ctx).run(ctx.fs())?;
    info!(task = IMAGES, written, "images optimized");
    Ok(())
}
