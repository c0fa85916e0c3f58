// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Configuration as read from `Assetdag.toml`, before validation.
///
/// ```toml
/// [paths]
/// dest = "dist"
///
/// [scripts]
/// source = "js"
/// bundle = "all.min.js"
///
/// [watch]
/// patterns = ["**/*.scss"]
/// task = "styles"
///
/// [task.lint]
/// cmd = "npx eslint js"
/// ```
///
/// Every section is optional; the defaults describe the conventional
/// `js/`, `sass/`, `images/` → `dist/` layout.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,
    #[serde(default)]
    pub paths: PathsSection,
    #[serde(default)]
    pub scripts: ScriptsSection,
    #[serde(default)]
    pub styles: StylesSection,
    #[serde(default)]
    pub images: ImagesSection,
    #[serde(default)]
    pub assets: AssetsSection,
    #[serde(default)]
    pub serve: ServeSection,
    #[serde(default)]
    pub watch: WatchSection,
    /// User-defined tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    paths: PathsSection,
    scripts: ScriptsSection,
    styles: StylesSection,
    images: ImagesSection,
    assets: AssetsSection,
    serve: ServeSection,
    watch: WatchSection,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            paths: raw.paths,
            scripts: raw.scripts,
            styles: raw.styles,
            images: raw.images,
            assets: raw.assets,
            serve: raw.serve,
            watch: raw.watch,
            task: raw.task,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn paths(&self) -> &PathsSection {
        &self.paths
    }

    pub fn scripts(&self) -> &ScriptsSection {
        &self.scripts
    }

    pub fn styles(&self) -> &StylesSection {
        &self.styles
    }

    pub fn images(&self) -> &ImagesSection {
        &self.images
    }

    pub fn assets(&self) -> &AssetsSection {
        &self.assets
    }

    pub fn serve(&self) -> &ServeSection {
        &self.serve
    }

    pub fn serve_mut(&mut self) -> &mut ServeSection {
        &mut self.serve
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ConfigSection {
    /// Upper bound on concurrently running tasks. `0` means "available
    /// parallelism".
    pub max_concurrency: usize,
}

impl ConfigSection {
    pub fn effective_concurrency(&self) -> usize {
        if self.max_concurrency > 0 {
            return self.max_concurrency;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// `[paths]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Output directory. `clean` empties it, every writer writes below it.
    pub dest: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            dest: "dist".to_string(),
        }
    }
}

/// `[scripts]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScriptsSection {
    pub source: String,
    pub patterns: Vec<String>,
    /// File name of the concatenated bundle.
    pub bundle: String,
    /// Subdirectory of `paths.dest`.
    pub dest: String,
    pub source_maps: bool,
}

impl Default for ScriptsSection {
    fn default() -> Self {
        Self {
            source: "js".to_string(),
            patterns: vec!["**/*.js".to_string()],
            bundle: "all.min.js".to_string(),
            dest: "js".to_string(),
            source_maps: true,
        }
    }
}

/// `[styles]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StylesSection {
    pub source: String,
    pub patterns: Vec<String>,
    /// Directory the compiled CSS lands in before minification. Owned by
    /// the styles task.
    pub intermediate: String,
    /// Stem of the stylesheet that becomes the bundle (`global.scss`).
    pub primary: String,
    pub bundle: String,
    pub dest: String,
    pub source_maps: bool,
}

impl Default for StylesSection {
    fn default() -> Self {
        Self {
            source: "sass".to_string(),
            patterns: vec!["**/*.scss".to_string()],
            intermediate: "css".to_string(),
            primary: "global".to_string(),
            bundle: "all.min.css".to_string(),
            dest: "styles".to_string(),
            source_maps: true,
        }
    }
}

/// `[images]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImagesSection {
    pub source: String,
    pub patterns: Vec<String>,
    pub dest: String,
    pub jpeg_quality: u8,
}

impl Default for ImagesSection {
    fn default() -> Self {
        Self {
            source: "images".to_string(),
            patterns: vec!["*.jpg".to_string(), "*.png".to_string()],
            dest: "content".to_string(),
            jpeg_quality: 85,
        }
    }
}

/// `[assets]` section: static files copied by the finishing task.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssetsSection {
    pub source: String,
    pub patterns: Vec<String>,
    pub dest: String,
}

impl Default for AssetsSection {
    fn default() -> Self {
        Self {
            source: ".".to_string(),
            patterns: vec!["*.html".to_string(), "icons/**/*".to_string()],
            dest: String::new(),
        }
    }
}

/// `[serve]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServeSection {
    pub host: String,
    pub port: u16,
    /// Delay between a finished rebuild and the reload broadcast.
    pub reload_delay_ms: u64,
}

impl Default for ServeSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            reload_delay_ms: 0,
        }
    }
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    /// Globs relative to the project root.
    pub patterns: Vec<String>,
    /// Task re-run on change.
    pub task: String,
    /// Coalescing window.
    pub debounce_ms: u64,
    /// Ignore modifications that leave the file content unchanged.
    pub use_hash: bool,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            patterns: vec!["**/*.scss".to_string()],
            task: "styles".to_string(),
            debounce_ms: 200,
            use_hash: false,
        }
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TaskConfig {
    /// Shell command to run.
    #[serde(default)]
    pub cmd: Option<String>,

    /// Tasks that must succeed before this one starts.
    #[serde(default)]
    pub after: Vec<String>,

    /// Composite task: stages run one after the other, members of a stage
    /// run concurrently.
    #[serde(default)]
    pub series: Option<Vec<Vec<String>>>,
}
