// src/pipeline/sourcemap.rs

//! Source map plumbing on top of `oxc_sourcemap`.
//!
//! Maps enter a pipeline as per-line identity maps, are stitched together
//! by concatenation, and are composed with the map the minifier returns for
//! its own output. Positions are zero-based throughout.

use std::sync::Arc;

use oxc_sourcemap::{ConcatSourceMapBuilder, SourceMapBuilder};

pub use oxc_sourcemap::SourceMap;

/// Map every line of `content` to the same line of `source`.
pub fn identity(source: &str, content: &str) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let id = builder.set_source_and_content(source, content);
    for line in 0..line_count(content) as u32 {
        builder.add_token(line, 0, line, 0, Some(id), None);
    }
    builder.into_sourcemap()
}

/// Stack maps vertically; each map starts at its given generated line.
pub fn concat(parts: &[(&SourceMap, u32)]) -> SourceMap {
    ConcatSourceMapBuilder::from_sourcemaps(parts).into_sourcemap()
}

/// Chain `outer` (output → intermediate) with `inner` (intermediate →
/// originals), giving output → originals.
///
/// Outer tokens that land on an unmapped intermediate position are
/// dropped. Columns are carried over relative to the inner token, which is
/// exact for the line maps built by [`identity`] and [`concat`].
pub fn compose(outer: &SourceMap, inner: &SourceMap) -> SourceMap {
    let table = inner.generate_lookup_table();
    let mut builder = SourceMapBuilder::default();
    let ids: Vec<u32> = inner
        .get_sources()
        .zip(inner.get_source_contents())
        .map(|(source, content)| {
            builder.set_source_and_content(source, content.map(Arc::as_ref).unwrap_or_default())
        })
        .collect();

    for token in outer.get_tokens() {
        if token.get_source_id().is_none() {
            continue;
        }
        let (line, col) = (token.get_src_line(), token.get_src_col());
        let Some(origin) = inner.lookup_token(&table, line, col) else {
            continue;
        };
        let Some(&source) = origin.get_source_id().and_then(|id| ids.get(id as usize)) else {
            continue;
        };
        builder.add_token(
            token.get_dst_line(),
            token.get_dst_col(),
            origin.get_src_line(),
            origin.get_src_col() + col.saturating_sub(origin.get_dst_col()),
            Some(source),
            None,
        );
    }
    builder.into_sourcemap()
}

/// A position in one of a map's sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// Resolve a generated position back to its source, if it is mapped.
pub fn original_position(map: &SourceMap, line: u32, column: u32) -> Option<OriginalPosition> {
    let table = map.generate_lookup_table();
    let token = map.lookup_token(&table, line, column)?;
    let source = map.get_source(token.get_source_id()?)?;
    Some(OriginalPosition {
        source: source.to_string(),
        line: token.get_src_line(),
        column: token.get_src_col() + column.saturating_sub(token.get_dst_col()),
    })
}

/// Serialize as a v3 source map for the generated file `file`.
pub fn to_json(map: &SourceMap, file: &str) -> String {
    let mut map = map.clone();
    map.set_file(file);
    map.to_json_string()
}

/// Number of lines as `split('\n')` sees them; a trailing newline starts
/// one more (empty) line.
pub fn line_count(text: &str) -> usize {
    text.split('\n').count()
}
