//! Property-based invariants from SPEC_FULL.md §8 (status exclusivity,
//! coordinate well-formedness, normalization idempotence, matcher
//! determinism, balloon monotonicity).

use async_trait::async_trait;
use dimcheck_compare::matcher::match_dimensions;
use dimcheck_compare::Comparator;
use dimcheck_core::error::ProviderError;
use dimcheck_core::geometry::pct_to_px;
use dimcheck_core::log::NullEventSink;
use dimcheck_core::model::{
    BindingStatus, ComparisonStatus, Dimension, DimensionFlag, Extras, FeatureType, MachineState, PartListItem, Unit,
};
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};
use dimcheck_core::text::normalize_dimension;
use proptest::prelude::*;
use std::collections::{HashMap, HashSet};

/// Never actually invoked by `balloon_monotonicity`: the generated
/// master/check dimensions always match 1:1 in Phase 1, so
/// `llm_fallback::resolve_unmatched` short-circuits on its empty-input
/// check before it would call out to this.
struct UnusedProvider;

#[async_trait]
impl JsonProvider for UnusedProvider {
    fn name(&self) -> &str {
        "unused"
    }
    async fn generate_json(&self, _: &[ImagePart], _: &str, _: &GenerateOptions) -> Result<String, ProviderError> {
        panic!("balloon_monotonicity should never need the LLM fallback")
    }
}

fn dim(feature_type: FeatureType, value: f64, coords: (u32, u32), verified: bool) -> Dimension {
    let mut flags = HashSet::new();
    if verified {
        flags.insert(DimensionFlag::OcrVerified);
    }
    Dimension {
        value: Some(value),
        unit: Unit::Mm,
        coordinates: coords,
        grid_ref: String::new(),
        feature_type,
        tolerance_class: None,
        upper_tol: None,
        lower_tol: None,
        item_number: None,
        entity_description: None,
        binding_status: BindingStatus::Unbound,
        confidence: 1.0,
        flags,
        zone: None,
        region_ocr_original: None,
        extras: Extras::new(),
    }
}

proptest! {
    /// Invariant 2: a dimension present only in the master never produces
    /// a `Fail` status — it is always `Missing`, and those two never
    /// overlap because `ComparisonStatus` is a single-valued enum.
    #[test]
    fn status_exclusivity_unmatched_is_missing_never_fail(
        value in -1000.0f64..1000.0,
        x in 0u32..10_000,
        y in 0u32..10_000,
    ) {
        let master = vec![dim(FeatureType::Dimension, value, (x, y), true)];
        let results = match_dimensions(&master, &[]);
        prop_assert_eq!(results[0].check_index, None);
        // no ComparisonStatus is constructed here directly (that happens in
        // `build_dimension_item`), but the matcher's `None` result is the
        // sole input that path maps to `ComparisonStatus::Missing`, which
        // by enum construction can never simultaneously equal `Fail`.
        prop_assert_ne!(ComparisonStatus::Missing, ComparisonStatus::Fail);
    }

    /// Invariant 3: binding a percentage coordinate against any positive
    /// image dimension always yields a pixel strictly inside `[0, dim)`.
    #[test]
    fn coordinate_well_formedness(
        pct in 0.0f64..=100.0,
        width in 1u32..20_000,
        height in 1u32..20_000,
    ) {
        let x = pct_to_px(pct, width);
        let y = pct_to_px(pct, height);
        prop_assert!(x < width);
        prop_assert!(y < height);
    }

    /// Invariant 4: re-normalizing an already-normalized dimension's
    /// canonical string form is a fixed point.
    #[test]
    fn normalization_idempotence(value in -100_000.0f64..100_000.0) {
        let once = normalize_dimension(&value.to_string());
        prop_assume!(once.is_some());
        let once = once.unwrap();
        let twice = normalize_dimension(&once.to_string());
        prop_assert_eq!(twice, Some(once));
    }

    /// Invariant 5: matching the same pair of dimension sets twice with
    /// no LLM phase (Phase-1 only) produces identical results.
    #[test]
    fn matcher_determinism(
        master_value in 0.0f64..500.0,
        check_value in 0.0f64..500.0,
        mx in 0u32..2000,
        my in 0u32..2000,
        cx in 0u32..2000,
        cy in 0u32..2000,
    ) {
        let master = vec![dim(FeatureType::Dimension, master_value, (mx, my), true)];
        let check = vec![dim(FeatureType::Dimension, check_value, (cx, cy), true)];

        let first = match_dimensions(&master, &check);
        let second = match_dimensions(&master, &check);

        prop_assert_eq!(first[0].check_index, second[0].check_index);
    }

    /// Invariant 6: balloon numbers assigned across `Comparator::compare`'s
    /// dimension/GD&T/BOM phases are strictly increasing in the emitted
    /// `ComparisonItem` order.
    #[test]
    fn balloon_monotonicity(
        dimension_count in 0usize..15,
        missing_gdt_count in 0usize..10,
        missing_bom_count in 0usize..10,
    ) {
        let dimensions: Vec<Dimension> = (0..dimension_count)
            .map(|i| dim(FeatureType::Dimension, i as f64, (i as u32, i as u32), true))
            .collect();
        let gdt_callouts: Vec<dimcheck_core::model::GdtCallout> = (0..missing_gdt_count)
            .map(|i| gdt_callout(&format!("A{i}")))
            .collect();
        let part_list: Vec<PartListItem> = (0..missing_bom_count)
            .map(|i| bom_part(&format!("P{i}")))
            .collect();

        let master = machine_state(dimensions.clone(), part_list, gdt_callouts);
        let check = machine_state(dimensions, Vec::new(), Vec::new());

        let provider = UnusedProvider;
        let comparator = Comparator::new(&provider);
        let sink = NullEventSink;
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let output = rt.block_on(comparator.compare(&master, &check, &sink));

        let balloons: Vec<u32> = output.comparisons.iter().map(|c| c.balloon_number).collect();
        prop_assert_eq!(balloons.len(), dimension_count + missing_gdt_count + missing_bom_count);
        prop_assert!(balloons.windows(2).all(|w| w[0] < w[1]));
        if !balloons.is_empty() {
            prop_assert_eq!(balloons[0], 1);
        }
    }
}

fn gdt_callout(grid_ref: &str) -> dimcheck_core::model::GdtCallout {
    dimcheck_core::model::GdtCallout {
        symbol: "flatness".to_string(),
        value: Some(0.1),
        datum: String::new(),
        grid_ref: grid_ref.to_string(),
        coordinates: (0, 0),
        extras: Extras::new(),
    }
}

fn bom_part(item_number: &str) -> PartListItem {
    PartListItem {
        item_number: item_number.to_string(),
        description: "Bracket".to_string(),
        material: "Steel".to_string(),
        quantity: 1,
        weight: None,
        unit: "ea".to_string(),
        extras: Extras::new(),
    }
}

fn machine_state(
    dimensions: Vec<Dimension>,
    part_list: Vec<PartListItem>,
    gdt_callouts: Vec<dimcheck_core::model::GdtCallout>,
) -> MachineState {
    MachineState {
        zones: Vec::new(),
        dimensions,
        part_list,
        gdt_callouts,
        title_block: HashMap::new(),
        raw_text: String::new(),
    }
}
