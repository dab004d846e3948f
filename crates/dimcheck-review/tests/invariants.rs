//! Property-based invariants from SPEC_FULL.md §8 (dedup law, region
//! containment).

use dimcheck_core::geometry::Rect;
use dimcheck_core::model::{DetectionMethod, ReviewCategory, ReviewFinding, ReviewResult, TextRegion, TextRegionType};
use dimcheck_review::dedup::deduplicate;
use dimcheck_review::region::refine_side;
use proptest::prelude::*;

fn finding(category: ReviewCategory, master_value: &str, location: &str) -> ReviewFinding {
    ReviewFinding {
        category,
        master_value: master_value.to_string(),
        check_value: None,
        finding_type: "diameter".to_string(),
        location: location.to_string(),
        description: String::new(),
        master_region: None,
        check_region: None,
        detection_method: DetectionMethod::None,
        coordinate_confidence: 0.3,
    }
}

fn category_at(i: usize) -> ReviewCategory {
    match i % 3 {
        0 => ReviewCategory::MissingDimension,
        1 => ReviewCategory::MissingTolerance,
        _ => ReviewCategory::ModifiedValue,
    }
}

proptest! {
    /// Invariant 1: after dedup, no two findings in the same category
    /// share a case-folded `(value, location)` key, and no
    /// `missing_dimension` shares its key with a `modified_value`.
    #[test]
    fn dedup_law(
        values in prop::collection::vec(0u32..5, 1..20),
        locations in prop::collection::vec(0u32..3, 1..20),
        categories in prop::collection::vec(0usize..3, 1..20),
    ) {
        let n = values.len().min(locations.len()).min(categories.len());
        let findings: Vec<ReviewFinding> = (0..n)
            .map(|i| finding(category_at(categories[i]), &format!("V{}", values[i]), &format!("LOC{}", locations[i])))
            .collect();
        let result = deduplicate(ReviewResult { findings, summary: String::new() });

        let mut seen = std::collections::HashSet::new();
        for f in &result.findings {
            let key = (f.category, f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase());
            prop_assert!(seen.insert(key), "duplicate (category, value, location) survived dedup");
        }

        let modified_keys: std::collections::HashSet<(String, String)> = result
            .findings
            .iter()
            .filter(|f| f.category == ReviewCategory::ModifiedValue)
            .map(|f| (f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase()))
            .collect();
        for f in result.findings.iter().filter(|f| f.category == ReviewCategory::MissingDimension) {
            let key = (f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase());
            prop_assert!(!modified_keys.contains(&key), "missing_dimension key shadowed by modified_value survived");
        }
    }

    /// Invariant 7: whichever region `refine_side` returns (OCR-anchored
    /// or the clamped LLM fallback) is always contained within the image.
    #[test]
    fn region_containment(
        llm_x in 0u32..2000, llm_y in 0u32..2000, llm_w in 1u32..500, llm_h in 1u32..500,
        width in 100u32..2000, height in 100u32..2000,
        has_ocr_match in any::<bool>(),
    ) {
        let llm_region = Rect::new(llm_x, llm_y, llm_w, llm_h);
        let traditional = if has_ocr_match {
            vec![TextRegion {
                text: "25.0".to_string(),
                region_type: TextRegionType::Dimension,
                confidence: 0.9,
                bbox: Rect::new(llm_x, llm_y, llm_w, llm_h),
                center_pct: (0.0, 0.0),
            }]
        } else {
            Vec::new()
        };

        let (refined, _method) = refine_side("25.0", Some(llm_region), &traditional, &[], width, height);

        if let Some(r) = refined {
            prop_assert!(r.x < width);
            prop_assert!(r.y < height);
            prop_assert!(r.x.saturating_add(r.w) <= width);
            prop_assert!(r.y.saturating_add(r.h) <= height);
        }
    }
}
