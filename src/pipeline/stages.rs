// src/pipeline/stages.rs

//! Transformation stages. Each stage consumes a [`FileSet`] and returns the
//! transformed set; any failure is a [`TaskError`] for the owning task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{StageError, TaskError};
use crate::fs::FileSystem;
use crate::pipeline::fileset::{FileSet, VirtualFile};
use crate::pipeline::sourcemap::{self, SourceMap};
use crate::transform::{ImageOptimizer, Minifier, Preprocessor};

/// One step of a pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;
    fn apply(&self, fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError>;
}

/// Attach an identity source map to every file.
#[derive(Debug, Default)]
pub struct SourceMapInit;

impl Stage for SourceMapInit {
    fn name(&self) -> &'static str {
        "sourcemap-init"
    }

    fn apply(&self, _fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        files
            .into_iter()
            .map(|mut file| -> Result<VirtualFile, TaskError> {
                let map = sourcemap::identity(&file.display_path(), file.text(self.name())?);
                file.source_map = Some(map);
                Ok(file)
            })
            .collect()
    }
}

/// Join all files into one, separated by a newline.
#[derive(Debug)]
pub struct Concat {
    output: PathBuf,
}

impl Concat {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
        }
    }
}

impl Stage for Concat {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn apply(&self, _fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        let Some(first) = files.iter().next() else {
            return Ok(files);
        };
        // The selection base: the first origin minus its relative path.
        let origin = first
            .origin
            .ancestors()
            .nth(first.path.components().count())
            .map(|base| base.join(&self.output))
            .unwrap_or_else(|| self.output.clone());

        let mut text = String::new();
        // Lines of files without a map stay unmapped.
        let mut parts = Vec::new();
        let mut offset = 0u32;

        for (i, file) in files.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            let body = file.text(self.name())?;
            text.push_str(body);

            if let Some(map) = &file.source_map {
                parts.push((map, offset));
            }
            offset += sourcemap::line_count(body) as u32;
        }

        let map = (!parts.is_empty()).then(|| sourcemap::concat(&parts));
        debug!(inputs = files.len(), output = %self.output.display(), "concatenated");

        let mut out = VirtualFile::new(&self.output, origin, text.into_bytes());
        out.source_map = map;
        Ok(FileSet::from(vec![out]))
    }
}

/// Minify every file as a whole.
///
/// When a file carries a source map, the minifier is asked for a map of its
/// own output and the two are composed, so the result still points at the
/// original sources. Minifier errors are moved to the original file and
/// position the same way.
#[derive(Debug)]
pub struct Minify {
    minifier: Arc<dyn Minifier>,
}

impl Minify {
    pub fn new(minifier: Arc<dyn Minifier>) -> Self {
        Self { minifier }
    }

    fn minify_file(&self, mut file: VirtualFile) -> Result<VirtualFile, TaskError> {
        let input_map = file.source_map.take();
        let text = file.text(self.name())?;

        let minified = self
            .minifier
            .minify(&file.path, text, input_map.is_some())
            .map_err(|err| match &input_map {
                Some(map) => relocate(err, map, &file.origin),
                None => err.in_file(&file.origin),
            })?;

        file.source_map = match (minified.map, input_map) {
            (Some(output_map), Some(input_map)) => {
                Some(sourcemap::compose(&output_map, &input_map))
            }
            _ => None,
        };
        file.set_text(minified.code);
        Ok(file)
    }
}

impl Stage for Minify {
    fn name(&self) -> &'static str {
        "minify"
    }

    fn apply(&self, _fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        files
            .into_iter()
            .map(|file| self.minify_file(file))
            .collect()
    }
}

/// Point a minifier error (one-based, in the minifier's input) at the
/// original source file and position.
fn relocate(err: StageError, map: &SourceMap, fallback: &Path) -> StageError {
    let Some(line) = err.line else {
        return err.in_file(fallback);
    };
    let column = err.column.unwrap_or(1);
    match sourcemap::original_position(map, line.saturating_sub(1), column.saturating_sub(1)) {
        Some(pos) => {
            let file = PathBuf::from(pos.source);
            err.in_file(file).at(Some(pos.line + 1), Some(pos.column + 1))
        }
        None => err.in_file(fallback),
    }
}

/// Emit `<file>.map` next to each mapped file and reference it from a
/// trailing comment.
#[derive(Debug, Default)]
pub struct SourceMapWrite;

impl Stage for SourceMapWrite {
    fn name(&self) -> &'static str {
        "sourcemap-write"
    }

    fn apply(&self, _fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        let mut out = FileSet::new();
        for mut file in files {
            let Some(map) = file.source_map.take() else {
                out.push(file);
                continue;
            };

            let name = file.file_name();
            let map_name = format!("{name}.map");
            let json = sourcemap::to_json(&map, &name);

            let is_css = file.path.extension().is_some_and(|ext| ext == "css");
            let comment = if is_css {
                format!("\n/*# sourceMappingURL={map_name} */")
            } else {
                format!("\n//# sourceMappingURL={map_name}")
            };
            let mut text = file.text(self.name())?.to_string();
            text.push_str(&comment);
            file.set_text(text);

            let map_path = file.path.with_file_name(&map_name);
            let map_origin = file.origin.with_file_name(&map_name);
            out.push(file);
            out.push(VirtualFile::new(map_path, map_origin, json.into_bytes()));
        }
        Ok(out)
    }
}

/// Compile each non-partial file with a [`Preprocessor`]; output paths get
/// a `.css` extension. Partials (`_name.scss`) are only reachable through
/// imports and are dropped.
#[derive(Debug)]
pub struct Preprocess {
    preprocessor: Arc<dyn Preprocessor>,
}

impl Preprocess {
    pub fn new(preprocessor: Arc<dyn Preprocessor>) -> Self {
        Self { preprocessor }
    }
}

impl Stage for Preprocess {
    fn name(&self) -> &'static str {
        "preprocess"
    }

    fn apply(&self, fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        let mut out = FileSet::new();
        for file in files {
            if file.file_name().starts_with('_') {
                continue;
            }
            let css = self.preprocessor.compile(fs, &file.origin)?;
            out.push(VirtualFile::new(
                file.path.with_extension("css"),
                file.origin.with_extension("css"),
                css.into_bytes(),
            ));
        }
        Ok(out)
    }
}

/// Run every file through an [`ImageOptimizer`].
#[derive(Debug)]
pub struct Optimize {
    optimizer: Arc<dyn ImageOptimizer>,
}

impl Optimize {
    pub fn new(optimizer: Arc<dyn ImageOptimizer>) -> Self {
        Self { optimizer }
    }
}

impl Stage for Optimize {
    fn name(&self) -> &'static str {
        "optimize"
    }

    fn apply(&self, _fs: &dyn FileSystem, files: FileSet) -> Result<FileSet, TaskError> {
        files
            .into_iter()
            .map(|mut file| -> Result<VirtualFile, TaskError> {
                file.contents = self.optimizer.optimize(&file.origin, &file.contents)?;
                Ok(file)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::transform::Minified;

    /// Drops the newlines that follow `{`, `;` or `}` and maps every
    /// output line start back to its input position. Fails on the token
    /// `syntax-error` or on unbalanced braces.
    #[derive(Debug)]
    struct Squash;

    impl Minifier for Squash {
        fn minify(
            &self,
            path: &Path,
            source: &str,
            with_map: bool,
        ) -> Result<Minified, StageError> {
            if let Some(pos) = source.lines().position(|l| l.contains("syntax-error")) {
                return Err(StageError::new("minify", "unexpected token")
                    .in_file(path)
                    .at(Some(pos as u32 + 1), Some(1)));
            }
            if source.matches('{').count() != source.matches('}').count() {
                return Err(StageError::new("minify", "unbalanced braces").in_file(path));
            }

            let mut code = String::new();
            let mut builder = oxc_sourcemap::SourceMapBuilder::default();
            let id = builder.set_source_and_content(&path.to_string_lossy(), source);
            for (line, text) in source.lines().enumerate() {
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                builder.add_token(0, code.len() as u32, line as u32, 0, Some(id), None);
                code.push_str(text);
            }
            Ok(Minified {
                code,
                map: with_map.then(|| builder.into_sourcemap()),
            })
        }
    }

    fn file(path: &str, text: &str) -> VirtualFile {
        VirtualFile::new(path, format!("/p/js/{path}"), text.as_bytes().to_vec())
    }

    fn run(stages: &[&dyn Stage], files: Vec<VirtualFile>) -> Result<FileSet, TaskError> {
        let fs = MockFileSystem::new();
        let mut set = FileSet::from(files);
        for stage in stages {
            set = stage.apply(&fs, set)?;
        }
        Ok(set)
    }

    #[test]
    fn concat_offsets_line_maps() {
        let out = run(
            &[&SourceMapInit, &Concat::new("all.js")],
            vec![file("a.js", "a1\na2\n"), file("b.js", "b1")],
        )
        .unwrap();

        let bundle = out.get("all.js").unwrap();
        assert_eq!(bundle.text("t").unwrap(), "a1\na2\n\nb1");
        let map = bundle.source_map.as_ref().unwrap();
        let pos = sourcemap::original_position(map, 3, 0).unwrap();
        assert_eq!((pos.source.as_str(), pos.line), ("b.js", 0));
        let pos = sourcemap::original_position(map, 1, 0).unwrap();
        assert_eq!((pos.source.as_str(), pos.line), ("a.js", 1));
    }

    #[test]
    fn minify_sees_the_whole_bundle() {
        let minify = Minify::new(Arc::new(Squash));
        let out = run(
            &[&SourceMapInit, &Concat::new("all.js"), &minify],
            vec![
                file("a_intro.js", "(function(){"),
                file("b_body.js", "var x = 1;"),
                file("c_outro.js", "})();"),
            ],
        )
        .unwrap();

        let bundle = out.get("all.js").unwrap();
        assert_eq!(bundle.text("t").unwrap(), "(function(){var x = 1;})();");
        let map = bundle.source_map.as_ref().unwrap();
        let body = sourcemap::original_position(map, 0, 14).unwrap();
        assert_eq!((body.source.as_str(), body.line, body.column), ("b_body.js", 0, 2));
        let outro = sourcemap::original_position(map, 0, 22).unwrap();
        assert_eq!(outro.source, "c_outro.js");
    }

    #[test]
    fn minify_error_points_at_original_source() {
        let minify = Minify::new(Arc::new(Squash));
        let err = run(
            &[&SourceMapInit, &Concat::new("all.js"), &minify],
            vec![file("a.js", "ok"), file("b.js", "fine\nsyntax-error")],
        )
        .unwrap_err();

        match err {
            TaskError::Stage(stage) => {
                assert_eq!(stage.file.as_deref(), Some(Path::new("b.js")));
                assert_eq!(stage.line, Some(2));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn minify_without_map_names_the_bundle() {
        let minify = Minify::new(Arc::new(Squash));
        let err = run(
            &[&Concat::new("all.js"), &minify],
            vec![file("a.js", "{")],
        )
        .unwrap_err();

        match err {
            TaskError::Stage(stage) => {
                assert_eq!(stage.file.as_deref(), Some(Path::new("/p/js/all.js")));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn write_adds_map_file_and_comment() {
        let out = run(
            &[&SourceMapInit, &Concat::new("all.min.css"), &SourceMapWrite],
            vec![file("global.css", "body{}")],
        )
        .unwrap();

        assert_eq!(out.paths(), vec!["all.min.css", "all.min.css.map"]);
        let css = out.get("all.min.css").unwrap().text("t").unwrap();
        assert!(css.ends_with("\n/*# sourceMappingURL=all.min.css.map */"));
        let map: serde_json::Value =
            serde_json::from_slice(&out.get("all.min.css.map").unwrap().contents).unwrap();
        assert_eq!(map["file"], "all.min.css");
        assert_eq!(map["sources"][0], "global.css");
    }

    #[test]
    fn concat_of_nothing_is_nothing() {
        let out = run(&[&Concat::new("all.js")], vec![]).unwrap();
        assert!(out.is_empty());
    }
}
