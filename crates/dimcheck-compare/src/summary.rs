//! Phase 6 — extraction-ratio sanity check and summary scoring (§4.4).

use dimcheck_core::log::EventSink;
use dimcheck_core::model::{ComparisonItem, ComparisonStatus, LogKind, PipelineStatus, Summary};

/// If the check/master dimension-count ratio falls outside this band the
/// extraction is flagged as suspect (informational, never fatal).
const EXTRACTION_RATIO_MIN: f64 = 0.7;
const EXTRACTION_RATIO_MAX: f64 = 1.3;

/// Log `dimension_count_mismatch=true` when the check/master extraction
/// counts diverge enough to suggest one drawing under- or
/// over-extracted (§4.4 Phase 6).
pub fn check_extraction_ratio(master_count: usize, check_count: usize, sink: &dyn EventSink) {
    if master_count == 0 {
        return;
    }
    let ratio = check_count as f64 / master_count as f64;
    if !(EXTRACTION_RATIO_MIN..=EXTRACTION_RATIO_MAX).contains(&ratio) {
        sink.publish(
            "comparator",
            LogKind::Finding,
            serde_json::json!({
                "dimension_count_mismatch": true,
                "master_count": master_count,
                "check_count": check_count,
                "ratio": ratio,
            }),
        );
    }
}

/// Tally the final `comparisons` list into a `Summary` (§4.4 Summary).
#[must_use]
pub fn summarize(comparisons: &[ComparisonItem], gdt_issues: u32, bom_mismatches: u32) -> Summary {
    let total = comparisons.len() as u32;
    let mut pass = 0u32;
    let mut fail = 0u32;
    let mut warning = 0u32;
    let mut deviation = 0u32;
    let mut missing = 0u32;

    for item in comparisons {
        match item.status {
            ComparisonStatus::Pass => pass += 1,
            ComparisonStatus::Fail => fail += 1,
            ComparisonStatus::Warning => warning += 1,
            ComparisonStatus::Deviation => deviation += 1,
            ComparisonStatus::Missing | ComparisonStatus::NotFound => missing += 1,
            ComparisonStatus::Pending => {}
        }
    }

    let total_matched = comparisons
        .iter()
        .filter(|i| !matches!(i.status, ComparisonStatus::Missing | ComparisonStatus::NotFound))
        .count()
        .max(1);
    let score = round_to_one((f64::from(pass + deviation) / total_matched as f64) * 100.0);

    Summary {
        total,
        pass,
        fail,
        warning,
        deviation,
        missing,
        gdt_issues,
        bom_mismatches,
        score,
        status: PipelineStatus::Ok,
    }
}

fn round_to_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimcheck_core::log::NullEventSink;

    fn item(status: ComparisonStatus) -> ComparisonItem {
        ComparisonItem {
            balloon_number: 1,
            feature_description: String::new(),
            master_nominal: None,
            master_upper_tol: None,
            master_lower_tol: None,
            master_tolerance_class: None,
            check_actual: None,
            deviation: None,
            status,
            master_coordinates: None,
            check_coordinates: None,
            master_region: None,
            check_region: None,
            zone: None,
            notes: String::new(),
            requires_manual_review: false,
            review_reason: None,
        }
    }

    #[test]
    fn extraction_ratio_within_band_logs_nothing() {
        check_extraction_ratio(10, 10, &NullEventSink);
    }

    #[test]
    fn summarize_counts_each_status() {
        let comparisons = vec![
            item(ComparisonStatus::Pass),
            item(ComparisonStatus::Pass),
            item(ComparisonStatus::Fail),
            item(ComparisonStatus::Missing),
        ];
        let summary = summarize(&comparisons, 0, 0);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.pass, 2);
        assert_eq!(summary.fail, 1);
        assert_eq!(summary.missing, 1);
    }

    #[test]
    fn score_excludes_missing_from_denominator() {
        let comparisons = vec![item(ComparisonStatus::Pass), item(ComparisonStatus::Missing)];
        let summary = summarize(&comparisons, 0, 0);
        assert_eq!(summary.score, 100.0);
    }

    #[test]
    fn empty_comparisons_do_not_divide_by_zero() {
        let summary = summarize(&[], 0, 0);
        assert_eq!(summary.score, 0.0);
    }
}
