//! Comparator (C4): matches master↔check dimensions, classifies each
//! pair, and diffs BOM/GD&T (§4.4).

pub mod bom;
pub mod gdt;
pub mod llm_fallback;
pub mod matcher;
pub mod summary;
pub mod tolerance;

use dimcheck_core::log::EventSink;
use dimcheck_core::model::{ComparisonItem, ComparisonStatus, Dimension, LogKind, MachineState, Summary};
use dimcheck_core::provider::JsonProvider;
use tracing::instrument;

/// The full Phase 1-6 output (§4.4 contract).
#[derive(Debug, Clone)]
pub struct ComparisonOutput {
    pub comparisons: Vec<ComparisonItem>,
    pub summary: Summary,
    pub bom_mismatches: Vec<bom::BomDiff>,
}

pub struct Comparator<'a> {
    provider: &'a dyn JsonProvider,
}

impl<'a> Comparator<'a> {
    #[must_use]
    pub fn new(provider: &'a dyn JsonProvider) -> Self {
        Self { provider }
    }

    /// Run every comparison phase against the frozen master/check
    /// `MachineState`s, assigning balloon numbers in dimension-then-BOM
    /// order (§3 invariant 1).
    #[instrument(skip(self, master, check, sink))]
    pub async fn compare(&self, master: &MachineState, check: &MachineState, sink: &dyn EventSink) -> ComparisonOutput {
        summary::check_extraction_ratio(master.dimensions.len(), check.dimensions.len(), sink);

        let phase1 = matcher::match_dimensions(&master.dimensions, &check.dimensions);
        let mut check_used = vec![false; check.dimensions.len()];
        for result in &phase1 {
            if let Some(idx) = result.check_index {
                check_used[idx] = true;
            }
        }

        let unmatched_master: Vec<(usize, &Dimension)> = phase1
            .iter()
            .filter(|r| r.check_index.is_none())
            .map(|r| (r.master_index, &master.dimensions[r.master_index]))
            .collect();
        let unmatched_check: Vec<(usize, &Dimension)> = check_used
            .iter()
            .enumerate()
            .filter(|(_, used)| !**used)
            .map(|(i, _)| (i, &check.dimensions[i]))
            .collect();

        let master_refs: Vec<&Dimension> = unmatched_master.iter().map(|(_, d)| *d).collect();
        let check_refs: Vec<&Dimension> = unmatched_check.iter().map(|(_, d)| *d).collect();

        let llm_matches = llm_fallback::resolve_unmatched(self.provider, &master_refs, &check_refs)
            .await
            .unwrap_or_else(|e| {
                sink.publish("comparator", LogKind::Error, serde_json::json!({"llm_fallback_error": e.to_string()}));
                Vec::new()
            });

        let mut resolved_check_for_master: Vec<Option<usize>> = phase1.iter().map(|r| r.check_index).collect();
        for llm_match in &llm_matches {
            if let (Some(&(master_original, _)), Some(&(check_original, _))) =
                (unmatched_master.get(llm_match.master_index), unmatched_check.get(llm_match.check_index))
            {
                resolved_check_for_master[master_original] = Some(check_original);
            }
        }

        let mut comparisons = Vec::with_capacity(master.dimensions.len());
        let mut balloon = 0u32;
        for (master_index, master_dim) in master.dimensions.iter().enumerate() {
            balloon += 1;
            let check_match = resolved_check_for_master[master_index].map(|idx| &check.dimensions[idx]);
            comparisons.push(build_dimension_item(balloon, master_dim, check_match));
        }

        let gdt_diffs = gdt::diff_gdt(&master.gdt_callouts, &check.gdt_callouts);
        let gdt_issues = gdt_diffs.len() as u32;
        for diff in &gdt_diffs {
            balloon += 1;
            comparisons.push(build_gdt_item(balloon, &diff));
        }

        let bom_diffs = bom::diff_bom(&master.part_list, &check.part_list);
        for diff in &bom_diffs {
            balloon += 1;
            comparisons.push(build_bom_item(balloon, diff));
        }

        let summary = summary::summarize(&comparisons, gdt_issues, bom_diffs.len() as u32);
        sink.publish(
            "comparator",
            LogKind::Complete,
            serde_json::json!({"total": summary.total, "score": summary.score}),
        );

        ComparisonOutput {
            comparisons,
            summary,
            bom_mismatches: bom_diffs,
        }
    }
}

fn build_dimension_item(balloon_number: u32, master: &Dimension, check: Option<&Dimension>) -> ComparisonItem {
    let Some(check) = check else {
        return ComparisonItem {
            balloon_number,
            feature_description: master.entity_description.clone().unwrap_or_default(),
            master_nominal: master.value,
            master_upper_tol: master.upper_tol,
            master_lower_tol: master.lower_tol,
            master_tolerance_class: master.tolerance_class.clone(),
            check_actual: None,
            deviation: None,
            status: ComparisonStatus::Missing,
            master_coordinates: Some(master.coordinates),
            check_coordinates: None,
            master_region: None,
            check_region: None,
            zone: master.zone.clone(),
            notes: "Dimension found in master but missing from check drawing".to_string(),
            requires_manual_review: false,
            review_reason: None,
        };
    };

    let nominal = master.value.unwrap_or(0.0);
    let actual = check.value.unwrap_or(0.0);
    let result = tolerance::evaluate(
        nominal,
        master.upper_tol,
        master.lower_tol,
        actual,
        master.tolerance_class.as_deref(),
        check.tolerance_class.as_deref(),
    );

    let (status, mut notes, mut requires_manual_review, review_reason) =
        (result.status, result.notes, result.requires_manual_review, None);

    let status = match (master.upper_tol.or(master.lower_tol), check.upper_tol.or(check.lower_tol)) {
        (Some(_), None) => {
            notes.push(tolerance::missing_tolerance_note().to_string());
            requires_manual_review = true;
            ComparisonStatus::Fail
        }
        (Some(m), Some(c)) if (m - c).abs() > f64::EPSILON => {
            if matches!(status, ComparisonStatus::Pass) {
                ComparisonStatus::Warning
            } else {
                status
            }
        }
        _ => status,
    };

    let review_reason = notes
        .iter()
        .find(|n| n.contains("Tolerance class changed"))
        .cloned()
        .or(review_reason);

    ComparisonItem {
        balloon_number,
        feature_description: master.entity_description.clone().unwrap_or_default(),
        master_nominal: master.value,
        master_upper_tol: master.upper_tol,
        master_lower_tol: master.lower_tol,
        master_tolerance_class: master.tolerance_class.clone(),
        check_actual: check.value,
        deviation: result.deviation,
        status,
        master_coordinates: Some(master.coordinates),
        check_coordinates: Some(check.coordinates),
        master_region: None,
        check_region: None,
        zone: master.zone.clone().or_else(|| check.zone.clone()),
        notes: notes.join("; "),
        requires_manual_review,
        review_reason,
    }
}

fn build_gdt_item(balloon_number: u32, diff: &gdt::GdtDiff) -> ComparisonItem {
    ComparisonItem {
        balloon_number,
        feature_description: format!("GD&T {}", diff.symbol),
        master_nominal: diff.master_value,
        master_upper_tol: None,
        master_lower_tol: None,
        master_tolerance_class: None,
        check_actual: diff.check_value,
        deviation: None,
        status: diff.status,
        master_coordinates: None,
        check_coordinates: None,
        master_region: None,
        check_region: None,
        zone: Some(diff.grid_ref.clone()),
        notes: diff.note.clone(),
        requires_manual_review: diff.status == ComparisonStatus::Fail,
        review_reason: None,
    }
}

fn build_bom_item(balloon_number: u32, diff: &bom::BomDiff) -> ComparisonItem {
    ComparisonItem {
        balloon_number,
        feature_description: format!("BOM item {}", diff.item_number),
        master_nominal: None,
        master_upper_tol: None,
        master_lower_tol: None,
        master_tolerance_class: None,
        check_actual: None,
        deviation: None,
        status: diff.status,
        master_coordinates: None,
        check_coordinates: None,
        master_region: None,
        check_region: None,
        zone: Some("BOM".to_string()),
        notes: diff.note.clone(),
        requires_manual_review: diff.status == ComparisonStatus::Fail,
        review_reason: None,
    }
}
