//! Phase 5 — BOM diff (§4.4). Parts are indexed by `item_number` since
//! they carry no spatial coordinates to match on.

use dimcheck_core::model::{ComparisonStatus, PartListItem};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BomDiff {
    pub item_number: String,
    pub status: ComparisonStatus,
    pub note: String,
}

fn index_by_item_number(parts: &[PartListItem]) -> HashMap<&str, &PartListItem> {
    parts.iter().map(|p| (p.item_number.as_str(), p)).collect()
}

/// Diff master against check BOM rows by `item_number` (§4.4 Phase 5).
#[must_use]
pub fn diff_bom(master: &[PartListItem], check: &[PartListItem]) -> Vec<BomDiff> {
    let master_index = index_by_item_number(master);
    let check_index = index_by_item_number(check);
    let mut diffs = Vec::new();

    for part in master {
        match check_index.get(part.item_number.as_str()) {
            None => diffs.push(BomDiff {
                item_number: part.item_number.clone(),
                status: ComparisonStatus::Missing,
                note: "Part missing from check BOM".to_string(),
            }),
            Some(matched) => {
                let field_diffs = field_differences(part, matched);
                if field_diffs.is_empty() {
                    continue;
                }
                diffs.push(BomDiff {
                    item_number: part.item_number.clone(),
                    status: ComparisonStatus::Fail,
                    note: field_diffs.join("; "),
                });
            }
        }
    }

    for part in check {
        if !master_index.contains_key(part.item_number.as_str()) {
            diffs.push(BomDiff {
                item_number: part.item_number.clone(),
                status: ComparisonStatus::Warning,
                note: "Part present on check BOM but absent from master".to_string(),
            });
        }
    }

    diffs
}

fn field_differences(master: &PartListItem, check: &PartListItem) -> Vec<String> {
    let mut diffs = Vec::new();
    if master.description != check.description {
        diffs.push(format!("description: '{}' \u{2192} '{}'", master.description, check.description));
    }
    if master.material != check.material {
        diffs.push(format!("material: '{}' \u{2192} '{}'", master.material, check.material));
    }
    if master.quantity != check.quantity {
        diffs.push(format!("quantity: {} \u{2192} {}", master.quantity, check.quantity));
    }
    diffs
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimcheck_core::model::Extras;

    fn part(item_number: &str, description: &str, material: &str, quantity: i64) -> PartListItem {
        PartListItem {
            item_number: item_number.to_string(),
            description: description.to_string(),
            material: material.to_string(),
            quantity,
            weight: None,
            unit: "ea".to_string(),
            extras: Extras::new(),
        }
    }

    #[test]
    fn identical_parts_produce_no_diff() {
        let master = vec![part("1", "bracket", "steel", 2)];
        let check = vec![part("1", "bracket", "steel", 2)];
        assert!(diff_bom(&master, &check).is_empty());
    }

    #[test]
    fn missing_part_is_missing_status() {
        let master = vec![part("1", "bracket", "steel", 2), part("2", "bolt", "steel", 4)];
        let check = vec![part("1", "bracket", "steel", 2)];
        let diffs = diff_bom(&master, &check);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].item_number, "2");
        assert_eq!(diffs[0].status, ComparisonStatus::Missing);
    }

    #[test]
    fn changed_field_is_fail_with_diff_note() {
        let master = vec![part("1", "bracket", "steel", 2)];
        let check = vec![part("1", "bracket", "aluminum", 2)];
        let diffs = diff_bom(&master, &check);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].status, ComparisonStatus::Fail);
        assert!(diffs[0].note.contains("material"));
    }

    #[test]
    fn extra_check_part_is_warning() {
        let master = vec![part("1", "bracket", "steel", 2)];
        let check = vec![part("1", "bracket", "steel", 2), part("2", "washer", "steel", 10)];
        let diffs = diff_bom(&master, &check);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].item_number, "2");
        assert_eq!(diffs[0].status, ComparisonStatus::Warning);
    }
}
