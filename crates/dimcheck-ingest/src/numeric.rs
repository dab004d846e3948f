//! Phase C — numeric normalization & validation (§4.3).

use dimcheck_core::model::{Dimension, DimensionFlag};
use dimcheck_core::text::{fails_pattern_validation, normalize_dimension};

/// Font-specific flag thresholds (§4.3 Phase C.3).
const MIN_PLAUSIBLE_DIMENSION: f64 = 0.001;
const MAX_PLAUSIBLE_DIMENSION: f64 = 10_000.0;
const MISSING_DECIMAL_THRESHOLD: f64 = 100.0;

/// Apply value parsing, pattern validation, and font-specific flags to a
/// freshly-bound dimension. `raw_value` is the string as the vision LLM
/// originally emitted it (before §4.3 Phase C.1 letter/digit repair).
pub fn validate(dimension: &mut Dimension, raw_value: &str) {
    let parsed = normalize_dimension(raw_value);
    if parsed != dimension.value {
        dimension.flags.insert(DimensionFlag::ValueNormalized);
    }
    dimension.value = parsed.or(dimension.value);

    if fails_pattern_validation(raw_value) {
        dimension.flags.insert(DimensionFlag::ValidationFailed);
        dimension.confidence *= 0.3;
    }

    let Some(value) = dimension.value else {
        return;
    };

    if value.abs() >= MISSING_DECIMAL_THRESHOLD && value.fract() == 0.0 {
        dimension.flags.insert(DimensionFlag::PossibleMissingDecimal);
        dimension.confidence *= 0.8;
    }
    if !(MIN_PLAUSIBLE_DIMENSION..=MAX_PLAUSIBLE_DIMENSION).contains(&value.abs()) {
        dimension.flags.insert(DimensionFlag::UnlikelyDimensionRange);
        dimension.confidence *= 0.8;
    }
    if raw_value.chars().any(|c| c.is_ascii_alphabetic()) && !is_allowlisted_context(raw_value) {
        dimension.flags.insert(DimensionFlag::PossibleLetterContamination);
        dimension.confidence *= 0.8;
    }
}

/// Letters that are expected in an otherwise-numeric dimension string
/// (unit suffixes, scientific notation) and so don't count as
/// contamination.
fn is_allowlisted_context(raw: &str) -> bool {
    let lower = raw.to_ascii_lowercase();
    ["mm", "cm", "in", "m", "e"]
        .iter()
        .any(|suffix| lower.ends_with(suffix) || lower.contains(&format!("{suffix}-")))
}
