// src/transform/raster.rs

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::errors::StageError;
use crate::transform::ImageOptimizer;

/// Re-encodes PNG (best compression) and JPEG (fixed quality) images.
/// Other formats pass through untouched.
#[derive(Debug, Clone, Copy)]
pub struct RasterOptimizer {
    jpeg_quality: u8,
}

impl RasterOptimizer {
    pub const DEFAULT_JPEG_QUALITY: u8 = 85;

    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }
}

impl Default for RasterOptimizer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_JPEG_QUALITY)
    }
}

impl ImageOptimizer for RasterOptimizer {
    fn optimize(&self, path: &Path, bytes: &[u8]) -> Result<Vec<u8>, StageError> {
        let fail = |msg: String| StageError::new("optimize", msg).in_file(path);

        let format = image::guess_format(bytes).map_err(|e| fail(e.to_string()))?;
        if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
            debug!(path = %path.display(), ?format, "format not optimized; copying");
            return Ok(bytes.to_vec());
        }

        let img = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| fail(e.to_string()))?;

        let mut out = Vec::new();
        match format {
            ImageFormat::Png => {
                let encoder = PngEncoder::new_with_quality(
                    &mut out,
                    CompressionType::Best,
                    FilterType::Adaptive,
                );
                img.write_with_encoder(encoder)
                    .map_err(|e| fail(e.to_string()))?;
            }
            _ => {
                let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);
                DynamicImage::ImageRgb8(img.to_rgb8())
                    .write_with_encoder(encoder)
                    .map_err(|e| fail(e.to_string()))?;
            }
        }

        // Never replace an image with a larger one.
        if out.len() >= bytes.len() {
            debug!(
                path = %path.display(),
                original = bytes.len(),
                optimized = out.len(),
                "optimized image not smaller; keeping original"
            );
            return Ok(bytes.to_vec());
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageBuffer, Rgb};

    use super::*;

    fn png_fast(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> =
            ImageBuffer::from_fn(width, height, |x, _| Rgb([(x % 2) as u8 * 255, 0, 0]));
        let mut out = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut out,
            CompressionType::Fast,
            FilterType::NoFilter,
        );
        DynamicImage::ImageRgb8(img).write_with_encoder(encoder).unwrap();
        out
    }

    #[test]
    fn png_never_grows_and_stays_decodable() {
        let original = png_fast(64, 64);
        let optimized = RasterOptimizer::default()
            .optimize(Path::new("a.png"), &original)
            .unwrap();

        assert!(optimized.len() <= original.len());
        let decoded = image::load(Cursor::new(&optimized), ImageFormat::Png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 64));
    }

    #[test]
    fn garbage_is_stage_error() {
        let err = RasterOptimizer::default()
            .optimize(Path::new("images/x.png"), b"definitely not an image")
            .unwrap_err();
        assert_eq!(err.stage, "optimize");
        assert_eq!(err.file.as_deref(), Some(Path::new("images/x.png")));
    }
}
