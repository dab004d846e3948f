//! PDF rasterization (§4.1). For PDFs the canonical size is the first page
//! rendered at 2x the PDF user-space units — this scale must match the
//! overlay-rendering scale documented in §6, so it is a named constant
//! rather than a magic literal anywhere else in the crate.

use dimcheck_core::error::LoaderError;
use dimcheck_core::model::{Image, SourceFormat};
use pdfium_render::prelude::*;
use std::path::Path;

/// PDF points per inch (standard PostScript/PDF unit conversion factor).
const PDF_POINTS_PER_INCH: f32 = 72.0;

/// The canonical PDF rasterization scale (§4.1, §6): "first page rendered
/// at 2x the PDF user-space units". Expressed as a DPI for
/// `pdfium_render`'s target-size API: `72 * 2 = 144`.
pub const CANONICAL_PDF_SCALE: f32 = 2.0;
const CANONICAL_PDF_DPI: f32 = PDF_POINTS_PER_INCH * CANONICAL_PDF_SCALE;

/// Rasterize the first page of a PDF at the canonical scale (§4.1).
pub fn render_first_page_canonical(pdfium: &Pdfium, path: &Path) -> Result<Image, LoaderError> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .map_err(|e| LoaderError::PdfDecode(e.to_string()))?;

    let page = document
        .pages()
        .first()
        .map_err(|e| LoaderError::PdfDecode(format!("PDF has no pages: {e}")))?;

    let width_pts = page.width().value;
    let height_pts = page.height().value;

    let target_width = (width_pts * CANONICAL_PDF_DPI / PDF_POINTS_PER_INCH) as i32;
    let target_height = (height_pts * CANONICAL_PDF_DPI / PDF_POINTS_PER_INCH) as i32;

    let render_config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_target_height(target_height);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| LoaderError::PdfDecode(format!("failed to render page 1: {e}")))?;

    let dynamic_image = bitmap.as_image();
    let (width_px, height_px) = (dynamic_image.width(), dynamic_image.height());

    let mut png_bytes = Vec::new();
    dynamic_image
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| LoaderError::PdfDecode(format!("failed to encode rasterized page: {e}")))?;

    Ok(Image {
        bytes: png_bytes,
        width_px,
        height_px,
        source_format: SourceFormat::Pdf,
        render_scale: f64::from(CANONICAL_PDF_SCALE),
    })
}
