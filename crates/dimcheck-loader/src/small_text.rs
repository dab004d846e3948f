//! Small-text detection and the adaptive-upscaling DPI table (§4.1).
//!
//! The loader inspects connected-component heights in a binarized copy of
//! the image to estimate how small the printed text actually is, then
//! picks a target rasterization DPI so downstream OCR and vision-LLM calls
//! get legible glyphs.

use image::{DynamicImage, GrayImage};
use imageproc::contours::find_contours;
use imageproc::contrast::{otsu_level, threshold};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    VerySmall,
    Small,
    Moderate,
    Normal,
}

#[derive(Debug, Clone, Copy)]
pub struct SmallTextReport {
    pub p10_char_height: f64,
    pub median_char_height: f64,
    pub severity: Severity,
    pub target_dpi: u32,
}

/// Minimum connected-component height to count as a character rather than
/// noise or a thin rule line.
const MIN_COMPONENT_HEIGHT: u32 = 3;
/// Maximum height before a component is almost certainly a border/frame
/// line rather than a glyph.
const MAX_COMPONENT_HEIGHT: u32 = 200;

/// Inspect the image and decide whether it needs adaptive upscaling
/// (§4.1 small-text detection table).
#[must_use]
pub fn detect(image: &DynamicImage) -> SmallTextReport {
    let gray = image.to_luma8();
    let heights = component_heights(&gray);

    if heights.is_empty() {
        return SmallTextReport {
            p10_char_height: 0.0,
            median_char_height: 0.0,
            severity: Severity::Normal,
            target_dpi: 300,
        };
    }

    let p10 = percentile(&heights, 0.10);
    let median = percentile(&heights, 0.50);
    let (severity, target_dpi) = classify(p10, median);

    SmallTextReport {
        p10_char_height: p10,
        median_char_height: median,
        severity,
        target_dpi,
    }
}

fn component_heights(gray: &GrayImage) -> Vec<u32> {
    let level = otsu_level(gray);
    let binary = threshold(gray, level);
    let contours = find_contours::<i32>(&binary);

    contours
        .into_iter()
        .filter_map(|c| {
            let min_y = c.points.iter().map(|p| p.y).min()?;
            let max_y = c.points.iter().map(|p| p.y).max()?;
            let height = (max_y - min_y).max(0) as u32;
            (height >= MIN_COMPONENT_HEIGHT && height <= MAX_COMPONENT_HEIGHT).then_some(height)
        })
        .collect()
}

fn percentile(sorted_source: &[u32], pct: f64) -> f64 {
    let mut values = sorted_source.to_vec();
    values.sort_unstable();
    if values.is_empty() {
        return 0.0;
    }
    let idx = ((values.len() - 1) as f64 * pct).round() as usize;
    f64::from(values[idx])
}

/// §4.1 small-text-detection table.
fn classify(p10: f64, median: f64) -> (Severity, u32) {
    if p10 < 8.0 {
        (Severity::VerySmall, 450)
    } else if p10 < 12.0 {
        (Severity::Small, 400)
    } else if median < 20.0 {
        (Severity::Moderate, 350)
    } else {
        (Severity::Normal, 300)
    }
}
