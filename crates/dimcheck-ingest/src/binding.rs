//! Phase D — spatial binding (§4.3). Converts percentage coordinates to
//! the canonical pixel space, computes grid references, and resolves each
//! dimension/GD&T callout against the part-list entity registry.

use dimcheck_core::geometry::{grid_ref, pct_to_px};
use dimcheck_core::model::{BindingStatus, Dimension, GdtCallout, PartListItem, Zone};
use std::collections::HashMap;

/// `item_number -> part_list_entry` built once per `MachineState` so every
/// dimension and callout resolves its binding against the same snapshot.
pub struct EntityRegistry<'a> {
    by_item_number: HashMap<&'a str, &'a PartListItem>,
}

impl<'a> EntityRegistry<'a> {
    #[must_use]
    pub fn build(part_list: &'a [PartListItem]) -> Self {
        Self {
            by_item_number: part_list.iter().map(|item| (item.item_number.as_str(), item)).collect(),
        }
    }

    #[must_use]
    pub fn lookup(&self, item_number: &str) -> Option<&'a PartListItem> {
        self.by_item_number.get(item_number).copied()
    }
}

/// Bind one dimension's pixel coordinates, grid reference, and entity
/// registry status in place.
pub fn bind_dimension(dimension: &mut Dimension, x_pct: f64, y_pct: f64, width: u32, height: u32, registry: &EntityRegistry<'_>) {
    let x = pct_to_px(x_pct, width);
    let y = pct_to_px(y_pct, height);
    dimension.coordinates = (x, y);
    dimension.grid_ref = grid_ref(x, y, width, height);

    match dimension.item_number.as_deref() {
        None => dimension.binding_status = BindingStatus::Unbound,
        Some(item_number) => match registry.lookup(item_number) {
            Some(entry) => {
                dimension.binding_status = BindingStatus::Verified;
                dimension.entity_description = Some(entry.description.clone());
            }
            None => dimension.binding_status = BindingStatus::Unverified,
        },
    }
}

/// Bind one GD&T callout's pixel coordinates and grid reference.
pub fn bind_gdt_callout(callout: &mut GdtCallout, x_pct: f64, y_pct: f64, width: u32, height: u32) {
    let x = pct_to_px(x_pct, width);
    let y = pct_to_px(y_pct, height);
    callout.coordinates = (x, y);
    callout.grid_ref = grid_ref(x, y, width, height);
}

/// Enrich a zone with a `startRef-endRef` grid span computed from its
/// percentage-space bounding extent.
pub fn enrich_zone_grid_span(zone: &mut Zone, start_x_pct: f64, start_y_pct: f64, end_x_pct: f64, end_y_pct: f64, width: u32, height: u32) {
    let start = grid_ref(pct_to_px(start_x_pct, width), pct_to_px(start_y_pct, height), width, height);
    let end = grid_ref(pct_to_px(end_x_pct, width), pct_to_px(end_y_pct, height), width, height);
    zone.grid_span = format!("{start}-{end}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use dimcheck_core::model::{Extras, FeatureType, Unit};
    use std::collections::HashSet;

    fn dimension_with_item(item_number: Option<&str>) -> Dimension {
        Dimension {
            value: Some(12.0),
            unit: Unit::Mm,
            coordinates: (0, 0),
            grid_ref: String::new(),
            feature_type: FeatureType::Dimension,
            tolerance_class: None,
            upper_tol: None,
            lower_tol: None,
            item_number: item_number.map(str::to_string),
            entity_description: None,
            binding_status: BindingStatus::Unbound,
            confidence: 1.0,
            flags: HashSet::new(),
            zone: None,
            region_ocr_original: None,
            extras: Extras::new(),
        }
    }

    fn part(item_number: &str) -> PartListItem {
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

    #[test]
    fn unbound_when_no_item_number() {
        let parts = vec![part("1")];
        let registry = EntityRegistry::build(&parts);
        let mut dim = dimension_with_item(None);
        bind_dimension(&mut dim, 0.5, 0.5, 1000, 800, &registry);
        assert_eq!(dim.binding_status, BindingStatus::Unbound);
        assert_eq!(dim.coordinates, (500, 400));
    }

    #[test]
    fn verified_when_item_number_resolves() {
        let parts = vec![part("1")];
        let registry = EntityRegistry::build(&parts);
        let mut dim = dimension_with_item(Some("1"));
        bind_dimension(&mut dim, 0.1, 0.1, 1000, 800, &registry);
        assert_eq!(dim.binding_status, BindingStatus::Verified);
        assert_eq!(dim.entity_description.as_deref(), Some("Bracket"));
    }

    #[test]
    fn unverified_when_item_number_absent_from_registry() {
        let parts: Vec<PartListItem> = vec![];
        let registry = EntityRegistry::build(&parts);
        let mut dim = dimension_with_item(Some("99"));
        bind_dimension(&mut dim, 0.1, 0.1, 1000, 800, &registry);
        assert_eq!(dim.binding_status, BindingStatus::Unverified);
    }

    #[test]
    fn zone_grid_span_formats_start_end() {
        let mut zone = Zone {
            name: "Detail A".to_string(),
            grid_span: String::new(),
            extras: Extras::new(),
        };
        enrich_zone_grid_span(&mut zone, 0.0, 0.0, 1.0, 1.0, 800, 600);
        assert!(zone.grid_span.contains('-'));
    }
}
