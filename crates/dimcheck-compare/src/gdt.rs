//! Phase 4 — GD&T callout diff (§4.4). Callouts are indexed by
//! `(grid_ref, symbol)` since they carry no item number to match on.

use dimcheck_core::model::{ComparisonStatus, GdtCallout};
use std::collections::HashMap;

/// A symbol pair the spec calls out explicitly as a dangerous swap — a
/// parallelism/perpendicularity mixup changes the datum relationship
/// entirely rather than just the tolerance magnitude.
const SYMBOL_SWAP_PAIRS: [(&str, &str); 1] = [("parallelism", "perpendicularity")];

#[derive(Debug, Clone)]
pub struct GdtDiff {
    pub grid_ref: String,
    pub symbol: String,
    pub check_symbol: Option<String>,
    pub master_value: Option<f64>,
    pub check_value: Option<f64>,
    pub status: ComparisonStatus,
    pub note: String,
}

fn index_by_grid_and_symbol(callouts: &[GdtCallout]) -> HashMap<(String, String), &GdtCallout> {
    callouts
        .iter()
        .map(|c| ((c.grid_ref.clone(), c.symbol.to_ascii_lowercase()), c))
        .collect()
}

/// Diff master against check GD&T callouts. Every master callout not found
/// on the check (by grid ref + symbol) is reported `missing`; callouts
/// present at the same location under a swapped symbol are reported as a
/// `symbol_mismatch` fail rather than a plain miss.
#[must_use]
pub fn diff_gdt(master: &[GdtCallout], check: &[GdtCallout]) -> Vec<GdtDiff> {
    let check_index = index_by_grid_and_symbol(check);
    let mut diffs = Vec::new();

    for callout in master {
        let key = (callout.grid_ref.clone(), callout.symbol.to_ascii_lowercase());
        if let Some(matched) = check_index.get(&key) {
            if (callout.value.unwrap_or(0.0) - matched.value.unwrap_or(0.0)).abs() > f64::EPSILON {
                diffs.push(GdtDiff {
                    grid_ref: callout.grid_ref.clone(),
                    symbol: callout.symbol.clone(),
                    check_symbol: Some(matched.symbol.clone()),
                    master_value: callout.value,
                    check_value: matched.value,
                    status: ComparisonStatus::Warning,
                    note: "GD&T tolerance value changed".to_string(),
                });
            }
            continue;
        }

        if let Some(swapped_symbol) = swap_counterpart(&callout.symbol) {
            let swap_key = (callout.grid_ref.clone(), swapped_symbol.to_ascii_lowercase());
            if let Some(matched) = check_index.get(&swap_key) {
                diffs.push(GdtDiff {
                    grid_ref: callout.grid_ref.clone(),
                    symbol: callout.symbol.clone(),
                    check_symbol: Some(matched.symbol.clone()),
                    master_value: callout.value,
                    check_value: matched.value,
                    status: ComparisonStatus::Fail,
                    note: format!("GD&T symbol changed: {} \u{2192} {}", callout.symbol, matched.symbol),
                });
                continue;
            }
        }

        diffs.push(GdtDiff {
            grid_ref: callout.grid_ref.clone(),
            symbol: callout.symbol.clone(),
            check_symbol: None,
            master_value: callout.value,
            check_value: None,
            status: ComparisonStatus::Warning,
            note: "GD&T callout missing on check drawing".to_string(),
        });
    }

    diffs
}

fn swap_counterpart(symbol: &str) -> Option<&'static str> {
    let lowered = symbol.to_ascii_lowercase();
    for (a, b) in SYMBOL_SWAP_PAIRS {
        if lowered == a {
            return Some(b);
        }
        if lowered == b {
            return Some(a);
        }
    }
    None
}
