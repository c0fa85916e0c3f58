// src/transform/js.rs

use std::path::Path;

use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier as OxcMinifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::errors::StageError;
use crate::transform::{Minified, Minifier};

/// JavaScript minifier backed by `oxc`.
///
/// Sources are parsed as classic scripts: the bundle is loaded with a plain
/// `<script>` tag, so top-level declarations are globals and must survive.
#[derive(Debug, Clone, Copy, Default)]
pub struct OxcScriptMinifier;

impl Minifier for OxcScriptMinifier {
    fn minify(&self, path: &Path, source: &str, with_map: bool) -> Result<Minified, StageError> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::cjs()).parse();

        if let Some(err) = ret.errors.first() {
            let offset = err
                .labels
                .as_ref()
                .and_then(|labels| labels.first())
                .map(|label| label.offset());
            let (line, column) = match offset {
                Some(offset) => line_col(source, offset),
                None => (None, None),
            };
            return Err(StageError::new("minify", err.to_string())
                .in_file(path)
                .at(line, column));
        }

        let mut program = ret.program;
        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::smallest()),
        };
        let ret = OxcMinifier::new(options).minify(&allocator, &mut program);
        let out = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                source_map_path: with_map.then(|| path.to_path_buf()),
                ..CodegenOptions::default()
            })
            .with_scoping(ret.scoping)
            .build(&program);

        Ok(Minified {
            code: out.code.trim_end_matches('\n').to_string(),
            map: out.map,
        })
    }
}

/// One-based line and column of a byte offset.
fn line_col(source: &str, offset: usize) -> (Option<u32>, Option<u32>) {
    let offset = offset.min(source.len());
    let before = source.get(..offset).unwrap_or(source);
    let line = before.matches('\n').count() + 1;
    let column = before.rsplit('\n').next().map(|l| l.chars().count()).unwrap_or(0) + 1;
    (Some(line as u32), Some(column as u32))
}
