//! Image Loader (C1): turns a PDF or raster file into a canonical
//! `dimcheck_core::model::Image`, applying adaptive upscaling when the
//! drawing's printed text is small, and exposing a secondary preprocessing
//! variant for region-level OCR verification (§4.1).
//!
//! `(width_px, height_px)` on the returned `Image` is established here and
//! is the single canonical authority other crates convert percentages
//! against (§9).

pub mod pdf;
pub mod preprocess;
pub mod small_text;

use dimcheck_core::error::LoaderError;
use dimcheck_core::model::{Image, SourceFormat};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use pdfium_render::prelude::Pdfium;
use std::path::Path;
use tracing::instrument;

/// Drawings rarely exceed this on a side; it bounds how far adaptive
/// upscaling is allowed to inflate an already-large raster (§4.1).
pub const MAX_DIMENSION_PX: u32 = 4096;

pub struct Loader {
    pdfium: Pdfium,
}

impl Loader {
    /// Bind the pdfium dynamic library. Matches the teacher's pattern of
    /// resolving the bundled/system library once at construction and
    /// reusing it for every subsequent load.
    pub fn new() -> Result<Self, LoaderError> {
        let bindings = Pdfium::bind_to_system_library()
            .or_else(|_| Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./")))
            .map_err(|e| LoaderError::PdfDecode(format!("failed to bind pdfium: {e}")))?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }

    /// Load a drawing from disk: rasterize if it's a PDF, decode directly
    /// otherwise, then apply adaptive upscaling if the printed text is
    /// small (§4.1).
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn load(&self, path: &Path) -> Result<Image, LoaderError> {
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        let image = if is_pdf {
            pdf::render_first_page_canonical(&self.pdfium, path)?
        } else {
            load_raster(path)?
        };

        self.adaptively_upscale(image)
    }

    /// Decide, from the image's small-text report, whether to re-render or
    /// resample at a higher target DPI, clamped so no side exceeds
    /// `MAX_DIMENSION_PX` (§4.1).
    fn adaptively_upscale(&self, image: Image) -> Result<Image, LoaderError> {
        let dynamic = image::load_from_memory(&image.bytes)
            .map_err(|e| LoaderError::ImageDecode(e.to_string()))?;

        let report = small_text::detect(&dynamic);
        if report.severity == small_text::Severity::Normal {
            return Ok(image);
        }

        let scale = f64::from(report.target_dpi) / 300.0;
        let target_width = ((f64::from(image.width_px) * scale) as u32).min(MAX_DIMENSION_PX);
        let target_height = ((f64::from(image.height_px) * scale) as u32).min(MAX_DIMENSION_PX);

        if target_width <= image.width_px && target_height <= image.height_px {
            return Ok(image);
        }

        let resized = dynamic.resize(target_width, target_height, FilterType::Lanczos3);
        let mut bytes = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .map_err(|e| LoaderError::ImageDecode(e.to_string()))?;

        Ok(Image {
            bytes,
            width_px: resized.width(),
            height_px: resized.height(),
            source_format: image.source_format,
            render_scale: image.render_scale * scale,
        })
    }

    /// Produce the secondary OCR preprocessing variant of an already-loaded
    /// image, for region-level OCR cross-checks (§4.3 Phase E).
    pub fn ocr_preprocess_variant(&self, image: &Image) -> Result<DynamicImage, LoaderError> {
        let dynamic = image::load_from_memory(&image.bytes)
            .map_err(|e| LoaderError::ImageDecode(e.to_string()))?;
        Ok(DynamicImage::ImageLuma8(preprocess::ocr_variant(&dynamic)))
    }
}

fn load_raster(path: &Path) -> Result<Image, LoaderError> {
    let bytes = std::fs::read(path)?;
    let dynamic = image::load_from_memory(&bytes).map_err(|e| LoaderError::ImageDecode(e.to_string()))?;
    let (width_px, height_px) = dynamic.dimensions();

    let source_format = match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase) {
        Some(ext) if ext == "png" => SourceFormat::Png,
        Some(ext) if ext == "jpg" || ext == "jpeg" => SourceFormat::Jpeg,
        Some(ext) => return Err(LoaderError::UnsupportedFormat(ext)),
        None => return Err(LoaderError::UnsupportedFormat(String::new())),
    };

    Ok(Image {
        bytes,
        width_px,
        height_px,
        source_format,
        render_scale: 1.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};
    use std::io::Write;

    fn write_test_png(path: &Path, w: u32, h: u32) {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(w, h, Rgb([240, 240, 240]));
        let mut bytes = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        let mut file = std::fs::File::create(path).unwrap();
        file.write_all(&bytes).unwrap();
    }

    #[test]
    fn load_raster_reads_dimensions_and_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.png");
        write_test_png(&path, 64, 32);

        let image = load_raster(&path).unwrap();
        assert_eq!((image.width_px, image.height_px), (64, 32));
        assert_eq!(image.source_format, SourceFormat::Png);
    }

    #[test]
    fn load_raster_rejects_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("drawing.dwg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(load_raster(&path), Err(LoaderError::UnsupportedFormat(_))));
    }
}
