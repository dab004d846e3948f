//! Phase 1 — deterministic matcher (§4.4). For each master dimension,
//! scan unused check dimensions and pick the highest-scoring match.

use dimcheck_core::model::{Dimension, DimensionFlag};

/// The match-score floor below which a candidate is not considered a
/// match at all (§4.4: "pick the highest-scoring match with score >= 2").
pub const MIN_MATCH_SCORE: i32 = 2;

const COORD_DISTANCE_CLOSE_PX: f64 = 100.0;
const COORD_DISTANCE_MEDIUM_PX: f64 = 250.0;
const COORD_DISTANCE_FAR_PX: f64 = 400.0;

/// Score one `(master, check)` candidate pair per the §4.4 factor table.
/// Values are never used to reject a match by design — large value
/// differences carry no penalty, only a bonus when they're close.
#[must_use]
pub fn score_pair(master: &Dimension, check: &Dimension) -> i32 {
    let mut score = 0i32;

    if master.feature_type == check.feature_type {
        score += 6;
    } else if feature_type_substring_contains(master, check) {
        score += 4;
    }

    if master.zone.is_some() && master.zone == check.zone {
        score += 3;
    }
    if master.item_number.is_some() && master.item_number == check.item_number {
        score += 3;
    }

    if let (Some(m), Some(c)) = (master.value, check.value) {
        if m != 0.0 {
            let ratio = ((c - m) / m).abs();
            if ratio < 0.01 {
                score += 3;
            } else if ratio < 0.10 {
                score += 2;
            } else if ratio < 0.30 {
                score += 1;
            }
        }
    }

    let distance = coord_distance(master.coordinates, check.coordinates);
    if distance < COORD_DISTANCE_CLOSE_PX {
        score += 3;
    } else if distance < COORD_DISTANCE_MEDIUM_PX {
        score += 2;
    } else if distance < COORD_DISTANCE_FAR_PX {
        score += 1;
    }

    match (&master.tolerance_class, &check.tolerance_class) {
        (Some(m), Some(c)) if m == c => score += 2,
        (Some(m), Some(c)) if m.eq_ignore_ascii_case(c) => score += 1,
        _ => {}
    }

    if master.unit == check.unit {
        score += 1;
    }

    if !check.flags.contains(&DimensionFlag::OcrVerified) {
        score -= 2;
    }
    if check.flags.contains(&DimensionFlag::ValidationFailed) {
        score -= 2;
    }

    score.max(0)
}

fn feature_type_substring_contains(master: &Dimension, check: &Dimension) -> bool {
    let m = format!("{:?}", master.feature_type).to_ascii_lowercase();
    let c = format!("{:?}", check.feature_type).to_ascii_lowercase();
    m.contains(&c) || c.contains(&m)
}

fn coord_distance(a: (u32, u32), b: (u32, u32)) -> f64 {
    let dx = f64::from(a.0) - f64::from(b.0);
    let dy = f64::from(a.1) - f64::from(b.1);
    (dx * dx + dy * dy).sqrt()
}

/// One resolved match from the master index to the check index, or
/// `None` when no candidate scored at or above `MIN_MATCH_SCORE`.
pub struct MatchResult {
    pub master_index: usize,
    pub check_index: Option<usize>,
}

/// Greedily match every master dimension against unused check
/// dimensions, first-scanned-wins on ties (§4.4).
#[must_use]
pub fn match_dimensions(master: &[Dimension], check: &[Dimension]) -> Vec<MatchResult> {
    let mut used = vec![false; check.len()];
    let mut results = Vec::with_capacity(master.len());

    for (master_index, master_dim) in master.iter().enumerate() {
        let mut best: Option<(usize, i32)> = None;
        for (check_index, check_dim) in check.iter().enumerate() {
            if used[check_index] {
                continue;
            }
            let score = score_pair(master_dim, check_dim);
            if score < MIN_MATCH_SCORE {
                continue;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((check_index, score)),
            }
        }

        match best {
            Some((check_index, _)) => {
                used[check_index] = true;
                results.push(MatchResult {
                    master_index,
                    check_index: Some(check_index),
                });
            }
            None => results.push(MatchResult {
                master_index,
                check_index: None,
            }),
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimcheck_core::model::{BindingStatus, Extras, FeatureType, Unit};
    use std::collections::HashSet;

    fn dim(feature_type: FeatureType, value: f64, coords: (u32, u32)) -> Dimension {
        let mut flags = HashSet::new();
        flags.insert(DimensionFlag::OcrVerified);
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

    #[test]
    fn exact_match_scores_above_floor() {
        let master = dim(FeatureType::Dimension, 12.0, (100, 100));
        let check = dim(FeatureType::Dimension, 12.0, (105, 100));
        assert!(score_pair(&master, &check) >= MIN_MATCH_SCORE);
    }

    #[test]
    fn large_value_difference_is_never_penalized() {
        let master = dim(FeatureType::Dimension, 12.0, (100, 100));
        let far_value = dim(FeatureType::Dimension, 999.0, (105, 100));
        let near_value = dim(FeatureType::Dimension, 12.1, (105, 100));
        assert!(score_pair(&master, &far_value) <= score_pair(&master, &near_value));
    }

    #[test]
    fn unverified_check_dimension_is_penalized_with_floor() {
        let master = dim(FeatureType::Dimension, 12.0, (100, 100));
        let mut check = dim(FeatureType::Dimension, 12.0, (105, 100));
        check.flags.clear();
        assert!(score_pair(&master, &check) < score_pair(&master, &dim(FeatureType::Dimension, 12.0, (105, 100))));
    }

    #[test]
    fn first_scanned_wins_on_tie() {
        let master = vec![dim(FeatureType::Dimension, 12.0, (100, 100))];
        let check = vec![
            dim(FeatureType::Dimension, 12.0, (100, 100)),
            dim(FeatureType::Dimension, 12.0, (100, 100)),
        ];
        let results = match_dimensions(&master, &check);
        assert_eq!(results[0].check_index, Some(0));
    }

    #[test]
    fn unmatched_master_dimension_has_no_check_index() {
        let master = vec![dim(FeatureType::Dimension, 12.0, (9000, 9000))];
        let check = vec![dim(FeatureType::Thread, 1.0, (0, 0))];
        let results = match_dimensions(&master, &check);
        assert!(results[0].check_index.is_none());
    }
}
