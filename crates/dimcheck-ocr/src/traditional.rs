//! Traditional OCR detector (§4.2): a generic glyph recognizer invoked
//! with multiple page-segmentation modes, at minimum "sparse text" and
//! "uniform block". Confidence is derived straight from engine output.

use crate::classify::classify;
use dimcheck_core::error::OcrEngineError;
use dimcheck_core::model::TextRegion;
use dimcheck_core::Rect;
use image::{DynamicImage, GenericImageView};
use leptess::{LepTess, Variable};
use tracing::warn;

/// The page-segmentation modes run over every image (§4.2). Tesseract PSM
/// codes: 11 = sparse text, 6 = uniform block of text.
const PAGE_SEGMENTATION_MODES: [i32; 2] = [11, 6];

pub struct TraditionalOcr;

impl TraditionalOcr {
    /// Run every configured page-segmentation mode over the image and
    /// concatenate their regions (duplicates kept by design — §4.2).
    ///
    /// Best-effort: a per-mode engine failure is logged and yields an
    /// empty contribution rather than aborting the detector.
    pub fn detect(&self, image: &DynamicImage) -> Vec<TextRegion> {
        let (width, height) = image.dimensions();
        let mut regions = Vec::new();

        for &psm in &PAGE_SEGMENTATION_MODES {
            match self.detect_with_psm(image, psm, width, height) {
                Ok(mut mode_regions) => regions.append(&mut mode_regions),
                Err(err) => warn!(psm, error = %err, "traditional OCR mode failed, skipping"),
            }
        }

        regions
    }

    fn detect_with_psm(
        &self,
        image: &DynamicImage,
        psm: i32,
        width: u32,
        height: u32,
    ) -> Result<Vec<TextRegion>, OcrEngineError> {
        let mut engine = LepTess::new(None, "eng")
            .map_err(|e| OcrEngineError::ModelLoad(format!("tesseract init failed: {e}")))?;

        engine
            .set_variable(Variable::TesseditPagesegMode, &psm.to_string())
            .map_err(|e| OcrEngineError::Preprocessing(format!("failed to set PSM {psm}: {e}")))?;

        let mut png_bytes = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
            .map_err(|e| OcrEngineError::Preprocessing(e.to_string()))?;

        engine
            .set_image_from_mem(&png_bytes)
            .map_err(|e| OcrEngineError::Preprocessing(format!("failed to load image into engine: {e}")))?;

        let text = engine
            .get_utf8_text()
            .map_err(|e| OcrEngineError::Inference(format!("text extraction failed: {e}")))?;
        let mean_confidence = (engine.mean_text_conf() as f32 / 100.0).clamp(0.0, 1.0);

        // leptess surfaces per-line geometry through the C API's iterator,
        // not the high-level wrapper; each non-blank line is emitted with
        // the whole-page mean confidence and no bbox until region-OCR
        // re-anchors it against the cached region list (§4.5).
        let regions = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| TextRegion {
                text: line.to_string(),
                region_type: classify(line),
                confidence: mean_confidence,
                bbox: Rect::new(0, 0, width.min(10).max(1), height.min(10).max(1)),
                center_pct: (0.5, 0.5),
            })
            .collect();

        Ok(regions)
    }
}
