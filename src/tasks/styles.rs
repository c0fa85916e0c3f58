// src/tasks/styles.rs

//! Stylesheets are built in four strictly sequential steps.
//!
//! The preprocessor names its output after its input, so the primary
//! stylesheet is compiled into the intermediate directory first, then
//! renamed to the bundle name, and only then minified into the output
//! directory. The intermediate directory belongs to this task alone and is
//! reset at the start of every run.

use tracing::{debug, info};

use crate::errors::TaskError;
use crate::pipeline::{Minify, Pipeline, Preprocess, Selection, SourceMapInit, SourceMapWrite};
use crate::tasks::{STYLES, TaskContext};

pub fn run(ctx: &TaskContext) -> Result<(), TaskError> {
    let cfg = ctx.config.styles();
    let fs = ctx.fs();
    let intermediate = ctx.path(&cfg.intermediate);

    // Reset the intermediate directory.
    if fs.is_dir(&intermediate) {
        fs.remove_dir_all(&intermediate)
            .map_err(|e| TaskError::io(&intermediate, e))?;
    }

    // Compile.
    let compiled = Pipeline::new(
        STYLES,
        Selection::new(ctx.path(&cfg.source), &cfg.patterns),
        &intermediate,
    )
    .stage(Preprocess::new(ctx.toolchain.preprocessor.clone()))
    .run(fs)?;

    if compiled == 0 {
        debug!(task = STYLES, "no stylesheets compiled");
        return Ok(());
    }

    // Rename the primary stylesheet to the bundle name, dropping the
    // pre-rename copy.
    let primary = intermediate.join(format!("{}.css", cfg.primary));
    if fs.is_file(&primary) {
        let bundle = intermediate.join(&cfg.bundle);
        fs.copy(&primary, &bundle)
            .map_err(|e| TaskError::io(&bundle, e))?;
        fs.remove_file(&primary)
            .map_err(|e| TaskError::io(&primary, e))?;
    }

    // Minify into the output directory.
    let mut minify = Pipeline::new(
        STYLES,
        Selection::new(&intermediate, &["*.css".to_string()]),
        ctx.dest_sub(&cfg.dest),
    );
    if cfg.source_maps {
        minify = minify.stage(SourceMapInit);
    }
    minify = minify.stage(Minify::new(ctx.toolchain.styles.clone()));
    if cfg.source_maps {
        minify = minify.stage(SourceMapWrite);
    }
    let written = minify.run(fs)?;

    info!(task = STYLES, compiled, written, "stylesheets built");
    Ok(())
}
