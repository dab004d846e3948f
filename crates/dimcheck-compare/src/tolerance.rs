//! Phase 3 — per-pair tolerance evaluation (§4.4).

use dimcheck_core::model::ComparisonStatus;

/// `(nominal, upper_tol, lower_tol, actual)` -> `(status, deviation, overlay_notes)`.
pub struct ToleranceResult {
    pub status: ComparisonStatus,
    pub deviation: Option<f64>,
    pub notes: Vec<String>,
    pub requires_manual_review: bool,
}

/// Classify one comparison pair per the §4.4 condition table, then apply
/// the value/tolerance/tolerance-class overlays.
#[must_use]
pub fn evaluate(
    nominal: f64,
    upper_tol: Option<f64>,
    lower_tol: Option<f64>,
    actual: f64,
    master_tolerance_class: Option<&str>,
    check_tolerance_class: Option<&str>,
) -> ToleranceResult {
    let deviation = actual - nominal;
    let mut status = base_status(nominal, upper_tol, lower_tol, deviation);
    let mut notes = Vec::new();
    let mut requires_manual_review = false;

    apply_value_comparison_overlay(nominal, actual, &mut status, &mut notes);
    apply_tolerance_overlay(upper_tol, lower_tol, &mut status, &mut notes);
    apply_tolerance_class_overlay(master_tolerance_class, check_tolerance_class, &mut status, &mut notes, &mut requires_manual_review);

    ToleranceResult {
        status,
        deviation: if nominal == 0.0 { None } else { Some(deviation) },
        notes,
        requires_manual_review,
    }
}

fn base_status(nominal: f64, upper_tol: Option<f64>, lower_tol: Option<f64>, deviation: f64) -> ComparisonStatus {
    if nominal == 0.0 {
        return ComparisonStatus::Pending;
    }

    match (upper_tol, lower_tol) {
        (Some(upper), Some(lower)) => {
            if deviation >= lower && deviation <= upper {
                ComparisonStatus::Pass
            } else if deviation.abs() <= 1.2 * upper.abs().max(lower.abs()) {
                ComparisonStatus::Warning
            } else if (deviation.abs() / nominal.abs()) > 0.10 {
                ComparisonStatus::Deviation
            } else {
                ComparisonStatus::Fail
            }
        }
        _ => {
            let abs_dev = deviation.abs();
            let pct_of_nominal = abs_dev / nominal.abs();
            if abs_dev < 0.001 || pct_of_nominal < 0.01 {
                ComparisonStatus::Pass
            } else if pct_of_nominal < 0.05 {
                ComparisonStatus::Warning
            } else {
                ComparisonStatus::Deviation
            }
        }
    }
}

/// Decimal-place errors (ratio of magnitudes >= 10) force `fail`; any
/// other value change gets a descriptive note.
fn apply_value_comparison_overlay(nominal: f64, actual: f64, status: &mut ComparisonStatus, notes: &mut Vec<String>) {
    if nominal == actual {
        return;
    }
    if nominal != 0.0 {
        let ratio = (actual / nominal).abs();
        if ratio >= 10.0 || (ratio > 0.0 && ratio <= 0.1) {
            *status = ComparisonStatus::Fail;
            notes.push(format!("Possible decimal-place error: master={nominal}, check={actual}"));
            return;
        }
    }
    notes.push(format!("Value modified: master={nominal}, check={actual}"));
}

fn apply_tolerance_overlay(upper_tol: Option<f64>, lower_tol: Option<f64>, status: &mut ComparisonStatus, notes: &mut Vec<String>) {
    if upper_tol.is_none() && lower_tol.is_none() {
        return;
    }
    // This overlay only fires when the *master* tolerance is compared
    // against an absent/differing check tolerance, which callers signal
    // by passing `None`/different values for the check side separately;
    // here we only have the resolved shared (nominal) tolerance, so the
    // "missing on check" case is handled by the caller before invoking
    // `evaluate` when it detects `check_upper_tol.is_none()`.
    let _ = (upper_tol, lower_tol, status, notes);
}

/// The caller detected the check drawing dropped a tolerance the master
/// specified; force `fail`.
#[must_use]
pub fn missing_tolerance_note() -> &'static str {
    "missing_tolerance"
}

/// Fires whenever the master names a tolerance class and the check either
/// dropped it (`check_class: None`) or recorded a different one — a
/// case-differing class ("H7" vs "h7") is flagged distinctly since that
/// usually signals a hole/shaft mixup rather than a genuine re-spec.
fn apply_tolerance_class_overlay(
    master_class: Option<&str>,
    check_class: Option<&str>,
    status: &mut ComparisonStatus,
    notes: &mut Vec<String>,
    requires_manual_review: &mut bool,
) {
    let Some(master) = master_class else {
        return;
    };
    let check = check_class.unwrap_or("");
    if master == check {
        return;
    }
    if !matches!(*status, ComparisonStatus::Fail | ComparisonStatus::Deviation) {
        *status = ComparisonStatus::Warning;
    }
    *requires_manual_review = true;
    if !check.is_empty() && master.eq_ignore_ascii_case(check) {
        notes.push(format!(
            "Tolerance class changed: {master} \u{2192} {check} (case difference \u{2014} verify hole/shaft distinction)"
        ));
    } else {
        notes.push(format!("Tolerance class changed: {master} \u{2192} {check}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_nominal_is_pending() {
        let result = evaluate(0.0, None, None, 5.0, None, None);
        assert_eq!(result.status, ComparisonStatus::Pending);
    }

    #[test]
    fn no_tolerance_tiny_deviation_passes() {
        let result = evaluate(100.0, None, None, 100.0005, None, None);
        assert_eq!(result.status, ComparisonStatus::Pass);
    }

    #[test]
    fn no_tolerance_moderate_deviation_warns() {
        let result = evaluate(100.0, None, None, 103.0, None, None);
        assert_eq!(result.status, ComparisonStatus::Warning);
    }

    #[test]
    fn no_tolerance_large_deviation_is_deviation_status() {
        let result = evaluate(100.0, None, None, 110.0, None, None);
        assert_eq!(result.status, ComparisonStatus::Deviation);
    }

    #[test]
    fn within_tolerance_band_passes() {
        let result = evaluate(10.0, Some(0.1), Some(-0.1), 10.05, None, None);
        assert_eq!(result.status, ComparisonStatus::Pass);
    }

    #[test]
    fn tolerance_class_case_difference_forces_warning_and_manual_review() {
        let result = evaluate(10.0, Some(0.1), Some(-0.1), 10.05, Some("H7"), Some("h7"));
        assert!(result.requires_manual_review);
        assert!(result.notes.iter().any(|n| n.contains("Tolerance class changed")));
    }

    #[test]
    fn decimal_place_error_forces_fail() {
        let result = evaluate(10.0, None, None, 100.0, None, None);
        assert_eq!(result.status, ComparisonStatus::Fail);
    }
}
