// src/transform/mod.rs

//! External transformation collaborators.
//!
//! Pipelines only see these traits. The default implementations wrap
//! third-party crates:
//!
//! - [`js::OxcScriptMinifier`]: `oxc` parser, minifier and codegen, with
//!   the codegen source map
//! - [`css::LightningCssMinifier`]: `lightningcss`, with its printer map
//! - [`scss::GrassPreprocessor`]: `grass`
//! - [`raster::RasterOptimizer`]: `image` (PNG and JPEG re-encoding)
//!
//! Every call is synchronous and reports failures as a [`StageError`].

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use oxc_sourcemap::SourceMap;

use crate::errors::StageError;
use crate::fs::FileSystem;

pub mod css;
pub mod js;
pub mod raster;
pub mod scss;

pub use css::LightningCssMinifier;
pub use js::OxcScriptMinifier;
pub use raster::RasterOptimizer;
pub use scss::GrassPreprocessor;

/// Output of a [`Minifier`].
#[derive(Debug, Clone)]
pub struct Minified {
    pub code: String,
    /// Maps `code` back to positions in the minifier's input. Only present
    /// when requested.
    pub map: Option<SourceMap>,
}

/// Source-to-source minification.
pub trait Minifier: Send + Sync + Debug {
    /// `path` names the input in errors and in the returned map. With
    /// `with_map`, the minifier also reports where each output token came
    /// from.
    fn minify(&self, path: &Path, source: &str, with_map: bool) -> Result<Minified, StageError>;
}

/// Compiles a stylesheet dialect to CSS, resolving imports through `fs`.
pub trait Preprocessor: Send + Sync + Debug {
    fn compile(&self, fs: &dyn FileSystem, path: &Path) -> Result<String, StageError>;
}

/// Lossless or lossy re-encoding of a raster image.
pub trait ImageOptimizer: Send + Sync + Debug {
    fn optimize(&self, path: &Path, bytes: &[u8]) -> Result<Vec<u8>, StageError>;
}

/// The set of collaborators the standard tasks use.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub scripts: Arc<dyn Minifier>,
    pub styles: Arc<dyn Minifier>,
    pub preprocessor: Arc<dyn Preprocessor>,
    pub images: Arc<dyn ImageOptimizer>,
}

impl Toolchain {
    /// Default collaborators, with the given JPEG quality.
    pub fn standard(jpeg_quality: u8) -> Self {
        Self {
            scripts: Arc::new(OxcScriptMinifier),
            styles: Arc::new(LightningCssMinifier),
            preprocessor: Arc::new(GrassPreprocessor::default()),
            images: Arc::new(RasterOptimizer::new(jpeg_quality)),
        }
    }
}

impl Default for Toolchain {
    fn default() -> Self {
        Self::standard(RasterOptimizer::DEFAULT_JPEG_QUALITY)
    }
}
