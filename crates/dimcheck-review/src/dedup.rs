//! Three deduplication passes over a merged `ReviewResult` (§4.5 Dedup).

use dimcheck_core::model::{ReviewCategory, ReviewFinding, ReviewResult};
use std::collections::HashSet;

/// Run all three deduplication passes in order and recompute the summary.
#[must_use]
pub fn deduplicate(mut result: ReviewResult) -> ReviewResult {
    collapse_within_category(&mut result.findings);
    remove_missing_shadowed_by_modified(&mut result.findings);
    result.summary = recompute_summary(&result.findings);
    result
}

/// Pass 1: within each category, collapse items sharing
/// `(lowercased(value), lowercased(location))`.
fn collapse_within_category(findings: &mut Vec<ReviewFinding>) {
    let mut seen: HashSet<(ReviewCategory, String, String)> = HashSet::new();
    findings.retain(|f| {
        let key = (f.category, f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase());
        seen.insert(key)
    });
}

/// Pass 2: a `missing_dimension` whose `(value, location)` also appears as
/// a `modified_value`'s `(master_value, location)` is shadowed by the more
/// specific finding and dropped.
fn remove_missing_shadowed_by_modified(findings: &mut Vec<ReviewFinding>) {
    let modified_keys: HashSet<(String, String)> = findings
        .iter()
        .filter(|f| f.category == ReviewCategory::ModifiedValue)
        .map(|f| (f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase()))
        .collect();

    findings.retain(|f| {
        if f.category != ReviewCategory::MissingDimension {
            return true;
        }
        let key = (f.master_value.to_ascii_lowercase(), f.location.to_ascii_lowercase());
        !modified_keys.contains(&key)
    });
}

/// Pass 3: recompute the summary string from the final counts.
fn recompute_summary(findings: &[ReviewFinding]) -> String {
    let missing = findings.iter().filter(|f| f.category == ReviewCategory::MissingDimension).count();
    let missing_tol = findings.iter().filter(|f| f.category == ReviewCategory::MissingTolerance).count();
    let modified = findings.iter().filter(|f| f.category == ReviewCategory::ModifiedValue).count();
    format!("{missing} missing dimension(s), {missing_tol} missing tolerance(s), {modified} modified value(s)")
}

#[cfg(test)]
mod tests {
    use super::*;

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
            detection_method: dimcheck_core::model::DetectionMethod::None,
            coordinate_confidence: 0.3,
        }
    }

    #[test]
    fn within_category_duplicates_collapse() {
        let result = ReviewResult {
            findings: vec![
                finding(ReviewCategory::MissingDimension, "25.0", "Section A-A"),
                finding(ReviewCategory::MissingDimension, "25.0", "section a-a"),
            ],
            summary: String::new(),
        };
        let deduped = deduplicate(result);
        assert_eq!(deduped.findings.len(), 1);
    }

    #[test]
    fn missing_shadowed_by_modified_is_removed() {
        let result = ReviewResult {
            findings: vec![
                finding(ReviewCategory::MissingDimension, "25.0", "Section A-A"),
                finding(ReviewCategory::ModifiedValue, "25.0", "Section A-A"),
            ],
            summary: String::new(),
        };
        let deduped = deduplicate(result);
        assert_eq!(deduped.findings.len(), 1);
        assert_eq!(deduped.findings[0].category, ReviewCategory::ModifiedValue);
    }

    #[test]
    fn distinct_findings_both_survive() {
        let result = ReviewResult {
            findings: vec![
                finding(ReviewCategory::MissingDimension, "25.0", "Section A-A"),
                finding(ReviewCategory::MissingDimension, "30.0", "Section B-B"),
            ],
            summary: String::new(),
        };
        let deduped = deduplicate(result);
        assert_eq!(deduped.findings.len(), 2);
    }

    #[test]
    fn summary_reflects_final_counts() {
        let result = ReviewResult {
            findings: vec![finding(ReviewCategory::MissingDimension, "25.0", "Section A-A")],
            summary: String::new(),
        };
        let deduped = deduplicate(result);
        assert!(deduped.summary.contains("1 missing dimension"));
    }
}
