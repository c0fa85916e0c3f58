// src/transform/scss.rs

use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::StageError;
use crate::fs::FileSystem;
use crate::transform::Preprocessor;

/// `sass/global.scss 3:14  root stylesheet`
static LOCATION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+):(\d+)\s+root stylesheet").ok());

/// SCSS compiler backed by `grass`. Imports are resolved through the
/// pipeline's [`FileSystem`].
#[derive(Debug, Clone, Default)]
pub struct GrassPreprocessor {
    style: OutputStyle,
}

/// Output formatting of the compiled CSS.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

impl GrassPreprocessor {
    pub fn with_style(style: OutputStyle) -> Self {
        Self { style }
    }
}

/// Adapter from our filesystem seam to the one `grass` expects.
#[derive(Debug)]
struct GrassFs<'a>(&'a dyn FileSystem);

impl grass::Fs for GrassFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        self.0.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.0.is_file(path)
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.0.read(path)
    }
}

impl Preprocessor for GrassPreprocessor {
    fn compile(&self, fs: &dyn FileSystem, path: &Path) -> Result<String, StageError> {
        let adapter = GrassFs(fs);
        let style = match self.style {
            OutputStyle::Expanded => grass::OutputStyle::Expanded,
            OutputStyle::Compressed => grass::OutputStyle::Compressed,
        };
        let options = grass::Options::default().style(style).fs(&adapter);

        grass::from_path(path, &options).map_err(|e| {
            let rendered = e.to_string();
            let (line, column) = location(&rendered);
            StageError::new("preprocess", first_line(&rendered))
                .in_file(path)
                .at(line, column)
        })
    }
}

fn first_line(rendered: &str) -> String {
    let line = rendered.lines().next().unwrap_or(rendered);
    line.strip_prefix("Error: ").unwrap_or(line).to_string()
}

fn location(rendered: &str) -> (Option<u32>, Option<u32>) {
    let Some(re) = LOCATION_RE.as_ref() else {
        return (None, None);
    };
    match re.captures(rendered) {
        Some(caps) => (
            caps.get(1).and_then(|m| m.as_str().parse().ok()),
            caps.get(2).and_then(|m| m.as_str().parse().ok()),
        ),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn compiles_with_imports_from_the_filesystem() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/sass/_vars.scss", "$main: #333;\n");
        fs.add_file(
            "/p/sass/global.scss",
            "@use 'vars';\nbody { color: vars.$main; }\n",
        );

        let css = GrassPreprocessor::default()
            .compile(&fs, Path::new("/p/sass/global.scss"))
            .unwrap();
        assert!(css.contains("color: #333"), "{css}");
    }

    #[test]
    fn syntax_error_carries_location() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/sass/global.scss", "body {\n  color: red;\n");

        let err = GrassPreprocessor::default()
            .compile(&fs, Path::new("/p/sass/global.scss"))
            .unwrap_err();
        assert_eq!(err.stage, "preprocess");
        assert_eq!(err.file.as_deref(), Some(Path::new("/p/sass/global.scss")));
        assert!(!err.message.starts_with("Error: "));
    }

    #[test]
    fn parses_rendered_location() {
        let rendered = "Error: expected \"}\".\n  ╷\n3 │ \n  ╵\n  sass/global.scss 3:14  root stylesheet";
        assert_eq!(location(rendered), (Some(3), Some(14)));
        assert_eq!(first_line(rendered), "expected \"}\".");
    }
}
