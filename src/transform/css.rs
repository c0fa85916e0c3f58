// src/transform/css.rs

use std::path::Path;

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc_sourcemap::{SourceMap, SourceMapBuilder};

use crate::errors::StageError;
use crate::transform::{Minified, Minifier};

/// CSS minifier backed by `lightningcss`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LightningCssMinifier;

impl Minifier for LightningCssMinifier {
    fn minify(&self, path: &Path, source: &str, with_map: bool) -> Result<Minified, StageError> {
        let options = ParserOptions {
            filename: path.to_string_lossy().into_owned(),
            ..ParserOptions::default()
        };

        let stylesheet = StyleSheet::parse(source, options).map_err(|e| {
            let (line, column) = match &e.loc {
                // lightningcss lines are zero-based, columns one-based.
                Some(loc) => (Some(loc.line + 1), Some(loc.column)),
                None => (None, None),
            };
            StageError::new("minify", e.kind.to_string())
                .in_file(path)
                .at(line, column)
        })?;

        let mut printer_map = with_map.then(|| parcel_sourcemap::SourceMap::new("/"));
        let result = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                source_map: printer_map.as_mut(),
                ..PrinterOptions::default()
            })
            .map_err(|e| StageError::new("minify", e.kind.to_string()).in_file(path))?;

        Ok(Minified {
            code: result.code,
            map: printer_map.map(|m| from_printer_map(&m, path, source)),
        })
    }
}

/// Re-express the printer's map as an `oxc_sourcemap` map over `source`.
fn from_printer_map(printer: &parcel_sourcemap::SourceMap, path: &Path, source: &str) -> SourceMap {
    let mut builder = SourceMapBuilder::default();
    let id = builder.set_source_and_content(&path.to_string_lossy(), source);
    for mapping in printer.get_mappings() {
        if let Some(original) = mapping.original {
            builder.add_token(
                mapping.generated_line,
                mapping.generated_column,
                original.original_line,
                original.original_column,
                Some(id),
                None,
            );
        }
    }
    builder.into_sourcemap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minifies_rules() {
        let out = LightningCssMinifier
            .minify(Path::new("all.min.css"), "body {\n  color: #ff0000;\n}\n", false)
            .unwrap();
        assert_eq!(out.code, "body{color:red}");
        assert!(out.map.is_none());
    }

    #[test]
    fn map_tracks_rules_to_their_lines() {
        let out = LightningCssMinifier
            .minify(Path::new("all.min.css"), "a { color: red }\n\nb { color: blue }\n", true)
            .unwrap();
        let map = out.map.expect("map requested");
        let lines: Vec<u32> = map.get_tokens().map(|t| t.get_src_line()).collect();
        assert!(lines.contains(&0), "{lines:?}");
        assert!(lines.contains(&2), "{lines:?}");
    }

    #[test]
    fn parse_error_names_file() {
        let err = LightningCssMinifier
            .minify(Path::new("all.min.css"), "..bad { color: red; }", false)
            .unwrap_err();
        assert_eq!(err.stage, "minify");
        assert_eq!(err.file.as_deref(), Some(Path::new("all.min.css")));
    }
}
