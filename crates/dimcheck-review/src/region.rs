//! OCR-anchored region refinement (§4.5 Region refinement). Replaces an
//! LLM-proposed region with the pixel-accurate bounding box of whichever
//! cached `TextRegion` most likely contains the same value.

use dimcheck_core::geometry::Rect;
use dimcheck_core::model::{DetectionMethod, ReviewFinding, TextRegion};

const PROXIMITY_BAND_PCT: f64 = 30.0;
const PROXIMITY_WEIGHT: f64 = 0.3;

/// Build the set of textual variants a value might appear as in raw OCR
/// output (§4.5 step 1).
#[must_use]
pub fn search_variants(value: &str) -> Vec<String> {
    let mut variants = vec![value.to_string()];

    if let Ok(parsed) = value.trim().parse::<f64>() {
        variants.push(format!("{parsed:.1}"));
        variants.push(format!("{parsed:.2}"));
        variants.push(format!("{parsed:.3}"));
        if parsed.fract() == 0.0 {
            variants.push(format!("{}", parsed as i64));
        }
    }

    let stripped: String = value.chars().filter(|c| !matches!(c, '\u{00B1}' | '\u{00D8}' | '\u{00B0}')).collect();
    if stripped != value {
        variants.push(stripped);
    }

    variants.sort();
    variants.dedup();
    variants
}

fn proximity_bonus(distance_pct: f64) -> f64 {
    (PROXIMITY_WEIGHT * (1.0 - distance_pct / PROXIMITY_BAND_PCT)).max(0.0)
}

/// Pick the best-matching `TextRegion` for one side of a finding, scanning
/// both the traditional and CNN detector outputs together, and return its
/// pixel bbox plus which detector family produced it (§4.5 steps 2-3).
#[must_use]
pub fn refine_side(
    value: &str,
    llm_region_px: Option<Rect>,
    traditional_regions: &[TextRegion],
    cnn_regions: &[TextRegion],
    image_width: u32,
    image_height: u32,
) -> (Option<Rect>, DetectionMethod) {
    let Some(llm_region) = llm_region_px else {
        return (None, DetectionMethod::None);
    };

    let variants = search_variants(value);
    let candidates = traditional_regions
        .iter()
        .map(|r| (r, DetectionMethod::OcrDetected))
        .chain(cnn_regions.iter().map(|r| (r, DetectionMethod::CnnDetected)));

    let mut best: Option<(&TextRegion, DetectionMethod, f64)> = None;
    for (region, method) in candidates {
        if !variants.iter().any(|v| region.text.to_ascii_lowercase().contains(&v.to_ascii_lowercase())) {
            continue;
        }
        let distance_pct = llm_region.distance_pct(&region.bbox, image_width, image_height);
        let score = f64::from(region.confidence) + proximity_bonus(distance_pct);
        match &best {
            Some((_, _, best_score)) if *best_score >= score => {}
            _ => best = Some((region, method, score)),
        }
    }

    match best {
        Some((region, method, _)) => (Some(region.bbox.clamp_to_bounds(image_width, image_height)), method),
        None => (Some(llm_region.clamp_to_bounds(image_width, image_height)), DetectionMethod::AiFallback),
    }
}

/// Refine both sides of one finding in place and recompute its
/// `detection_method`/`coordinate_confidence` (§4.5 steps 2-4, Region
/// scaling).
pub fn refine_finding(
    finding: &mut ReviewFinding,
    master_traditional: &[TextRegion],
    master_cnn: &[TextRegion],
    check_traditional: &[TextRegion],
    check_cnn: &[TextRegion],
    master_size: (u32, u32),
    check_size: (u32, u32),
) {
    let (master_region, master_method) = refine_side(
        &finding.master_value,
        finding.master_region,
        master_traditional,
        master_cnn,
        master_size.0,
        master_size.1,
    );

    let check_value = finding.check_value.as_deref().unwrap_or(&finding.master_value);
    let (check_region, check_method) =
        refine_side(check_value, finding.check_region, check_traditional, check_cnn, check_size.0, check_size.1);

    finding.master_region = master_region;
    finding.check_region = check_region;
    finding.detection_method = if master_method.base_confidence() >= check_method.base_confidence() {
        master_method
    } else {
        check_method
    };
    finding.coordinate_confidence = (master_method.base_confidence() + check_method.base_confidence()) / 2.0;
}
