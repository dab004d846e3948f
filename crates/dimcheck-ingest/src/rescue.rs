//! Phase E — coordinate rescue, OCR cross-checks, and focused
//! re-verification (§4.3).

use dimcheck_core::model::{Dimension, DimensionFlag};
use image::{GenericImageView, GrayImage};
use leptess::{LepTess, Variable};
use std::collections::HashSet;

/// Ink-detection sampling radius and stride around a dimension's
/// coordinate (§4.3: "radius of 10 sampling at stride 3").
const INK_SAMPLE_RADIUS: i32 = 10;
const INK_SAMPLE_STRIDE: i32 = 3;
/// A pixel darker than this (0-255 luma) counts as ink.
const INK_THRESHOLD: u8 = 200;
/// Minimum non-white fraction within the sample radius to call a
/// neighborhood "inked".
const MIN_INK_FRACTION: f64 = 0.15;

/// Spiral search radii and per-radius direction count (§4.3).
const SPIRAL_RADII: [i32; 10] = [10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
const SPIRAL_DIRECTIONS: usize = 8;

/// Region-OCR crop half-width around a dimension's coordinate, and the
/// upscale factor applied before thresholding (§4.3).
const REGION_CROP_HALF_PX: u32 = 80;
const REGION_UPSCALE_FACTOR: u32 = 4;

/// Digit-confusion correction pairs the region-OCR check is allowed to
/// apply (§4.3 Phase E).
const DIGIT_CONFUSIONS: [(char, char); 4] = [('3', '4'), ('3', '8'), ('6', '8'), ('1', '7')];

/// If the pixel neighborhood around `dimension`'s coordinate has no ink,
/// search outward in a discrete spiral for the nearest inked region and
/// relocate it there (§4.3 "coordinate rescue").
pub fn rescue_coordinate(dimension: &mut Dimension, gray: &GrayImage) {
    let (x, y) = dimension.coordinates;
    if is_inked(gray, x as i32, y as i32) {
        return;
    }

    for &radius in &SPIRAL_RADII {
        for step in 0..SPIRAL_DIRECTIONS {
            let angle = 2.0 * std::f64::consts::PI * step as f64 / SPIRAL_DIRECTIONS as f64;
            let candidate_x = x as i32 + (f64::from(radius) * angle.cos()) as i32;
            let candidate_y = y as i32 + (f64::from(radius) * angle.sin()) as i32;
            if is_inked(gray, candidate_x, candidate_y) {
                dimension.coordinates = (candidate_x.max(0) as u32, candidate_y.max(0) as u32);
                dimension.flags.insert(DimensionFlag::CoordinateAdjusted);
                return;
            }
        }
    }
}

fn is_inked(gray: &GrayImage, cx: i32, cy: i32) -> bool {
    let (width, height) = gray.dimensions();
    let mut sampled = 0u32;
    let mut inked = 0u32;

    let mut dy = -INK_SAMPLE_RADIUS;
    while dy <= INK_SAMPLE_RADIUS {
        let mut dx = -INK_SAMPLE_RADIUS;
        while dx <= INK_SAMPLE_RADIUS {
            let x = cx + dx;
            let y = cy + dy;
            if x >= 0 && y >= 0 && (x as u32) < width && (y as u32) < height {
                sampled += 1;
                if gray.get_pixel(x as u32, y as u32).0[0] < INK_THRESHOLD {
                    inked += 1;
                }
            }
            dx += INK_SAMPLE_STRIDE;
        }
        dy += INK_SAMPLE_STRIDE;
    }

    sampled > 0 && f64::from(inked) / f64::from(sampled) >= MIN_INK_FRACTION
}

/// Full-image OCR cross-check (§4.3): a dimension is verified if any
/// representation of its value appears in the union of detected numeric
/// tokens.
pub fn cross_check_against_ocr(dimension: &mut Dimension, numeric_tokens: &HashSet<String>) {
    let Some(value) = dimension.value else { return };

    let representations = [
        format!("{value:.0}"),
        format!("{value:.1}"),
        format!("{value:.2}"),
    ];

    if representations.iter().any(|r| numeric_tokens.contains(r)) {
        dimension.flags.insert(DimensionFlag::OcrVerified);
    } else {
        dimension.confidence *= 0.6;
    }
}

/// Region-OCR (§4.3, "the hardest check"): crop around the dimension's
/// coordinate, upscale, threshold, and run digit-restricted OCR, applying
/// either a confirmation boost or a digit-confusion correction.
pub fn region_ocr_check(dimension: &mut Dimension, gray: &GrayImage) {
    let Some(value) = dimension.value else { return };

    let Some(region_text) = run_digit_restricted_ocr(gray, dimension.coordinates) else {
        return;
    };
    let Ok(region_value) = region_text.trim().parse::<f64>() else {
        return;
    };

    let diff = (region_value - value).abs();
    if diff < 0.01 {
        dimension.confidence = (dimension.confidence * 1.1).min(1.0);
    } else if diff <= 1.5 && dimension.confidence < 0.85 && is_digit_confusion(value, region_value) {
        dimension.region_ocr_original = Some(value);
        dimension.value = Some(region_value);
        dimension.confidence = 0.7;
        dimension.flags.insert(DimensionFlag::RegionOcrCorrected);
    }
}

fn is_digit_confusion(a: f64, b: f64) -> bool {
    let a_digits: Vec<char> = format!("{a}").chars().filter(char::is_ascii_digit).collect();
    let b_digits: Vec<char> = format!("{b}").chars().filter(char::is_ascii_digit).collect();
    if a_digits.len() != b_digits.len() {
        return false;
    }
    a_digits.iter().zip(b_digits.iter()).any(|(&x, &y)| {
        x != y && DIGIT_CONFUSIONS.iter().any(|&(p, q)| (x == p && y == q) || (x == q && y == p))
    })
}

fn run_digit_restricted_ocr(gray: &GrayImage, coordinates: (u32, u32)) -> Option<String> {
    let (width, height) = gray.dimensions();
    let (cx, cy) = coordinates;

    let x0 = cx.saturating_sub(REGION_CROP_HALF_PX);
    let y0 = cy.saturating_sub(REGION_CROP_HALF_PX);
    let x1 = (cx + REGION_CROP_HALF_PX).min(width);
    let y1 = (cy + REGION_CROP_HALF_PX).min(height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    let cropped = image::imageops::crop_imm(gray, x0, y0, x1 - x0, y1 - y0).to_image();
    let upscaled = image::imageops::resize(
        &cropped,
        cropped.width() * REGION_UPSCALE_FACTOR,
        cropped.height() * REGION_UPSCALE_FACTOR,
        image::imageops::FilterType::Lanczos3,
    );

    let level = imageproc::contrast::otsu_level(&upscaled);
    let binary = imageproc::contrast::threshold(&upscaled, level);

    let mut engine = LepTess::new(None, "eng").ok()?;
    engine.set_variable(Variable::TesseditPagesegMode, "7").ok()?;
    engine.set_variable(Variable::TesseditCharWhitelist, "0123456789.").ok()?;

    let mut png_bytes = Vec::new();
    binary
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .ok()?;
    engine.set_image_from_mem(&png_bytes).ok()?;

    engine.get_utf8_text().ok().filter(|t| !t.trim().is_empty())
}

/// Multiply every dimension's confidence by the small-text global penalty
/// and flag it (§4.3).
pub fn apply_small_text_penalty(dimensions: &mut [Dimension]) {
    for dimension in dimensions {
        dimension.confidence *= 0.9;
        dimension.flags.insert(DimensionFlag::SmallTextDetected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimcheck_core::model::{BindingStatus, Extras, FeatureType, Unit};

    fn dimension(value: f64) -> Dimension {
        Dimension {
            value: Some(value),
            unit: Unit::Mm,
            coordinates: (50, 50),
            grid_ref: String::new(),
            feature_type: FeatureType::Dimension,
            tolerance_class: None,
            upper_tol: None,
            lower_tol: None,
            item_number: None,
            entity_description: None,
            binding_status: BindingStatus::Unbound,
            confidence: 1.0,
            flags: HashSet::new(),
            zone: None,
            region_ocr_original: None,
            extras: Extras::new(),
        }
    }

    #[test]
    fn verified_dimension_gets_flag_and_no_penalty() {
        let mut dim = dimension(12.0);
        let tokens: HashSet<String> = ["12".to_string()].into_iter().collect();
        cross_check_against_ocr(&mut dim, &tokens);
        assert!(dim.flags.contains(&DimensionFlag::OcrVerified));
        assert_eq!(dim.confidence, 1.0);
    }

    #[test]
    fn unverified_dimension_takes_confidence_penalty() {
        let mut dim = dimension(12.0);
        let tokens: HashSet<String> = ["99".to_string()].into_iter().collect();
        cross_check_against_ocr(&mut dim, &tokens);
        assert!(!dim.flags.contains(&DimensionFlag::OcrVerified));
        assert!((dim.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn small_text_penalty_applies_uniformly() {
        let mut dims = vec![dimension(1.0), dimension(2.0)];
        apply_small_text_penalty(&mut dims);
        for d in &dims {
            assert!((d.confidence - 0.9).abs() < 1e-9);
            assert!(d.flags.contains(&DimensionFlag::SmallTextDetected));
        }
    }

    #[test]
    fn digit_confusion_detects_known_pairs() {
        assert!(is_digit_confusion(34.0, 84.0));
        assert!(is_digit_confusion(16.0, 18.0));
        assert!(!is_digit_confusion(12.0, 99.0));
    }

    #[test]
    fn coordinate_rescue_is_noop_when_already_inked() {
        let mut gray = GrayImage::new(100, 100);
        for y in 40..60 {
            for x in 40..60 {
                gray.put_pixel(x, y, image::Luma([0]));
            }
        }
        let mut dim = dimension(12.0);
        dim.coordinates = (50, 50);
        rescue_coordinate(&mut dim, &gray);
        assert_eq!(dim.coordinates, (50, 50));
        assert!(!dim.flags.contains(&DimensionFlag::CoordinateAdjusted));
    }
}
