//! Output post-processing (§4.2): reading-order sort and the greedy
//! `grouped_regions` merge.

use dimcheck_core::model::{TextRegion, TextRegionType};

/// Two region centers within this fraction of either image dimension are
/// considered part of the same group (§4.2: "within <= 3% of image
/// dimensions").
const GROUP_PROXIMITY_PCT: f64 = 0.03;

/// Sort regions top-to-bottom, then left-to-right.
pub fn sort_reading_order(regions: &mut [TextRegion]) {
    regions.sort_by(|a, b| {
        a.center_pct
            .1
            .partial_cmp(&b.center_pct.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.center_pct.0.partial_cmp(&b.center_pct.0).unwrap_or(std::cmp::Ordering::Equal))
    });
}

/// Greedily merge adjacent regions whose centers are within
/// `GROUP_PROXIMITY_PCT` of each other in both axes. The merged region's
/// text is the concatenation in encounter order; its position is inherited
/// from the first dimension/diameter anchor in the group, or the first
/// member otherwise (§4.2).
#[must_use]
pub fn grouped_regions(sorted: &[TextRegion]) -> Vec<TextRegion> {
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (idx, region) in sorted.iter().enumerate() {
        let mut joined = false;
        for group in &mut groups {
            let last = *group.last().expect("group is never empty");
            let other = &sorted[last];
            if (region.center_pct.0 - other.center_pct.0).abs() <= GROUP_PROXIMITY_PCT
                && (region.center_pct.1 - other.center_pct.1).abs() <= GROUP_PROXIMITY_PCT
            {
                group.push(idx);
                joined = true;
                break;
            }
        }
        if !joined {
            groups.push(vec![idx]);
        }
    }

    groups
        .into_iter()
        .map(|indices| merge_group(sorted, &indices))
        .collect()
}

fn is_anchor(region_type: TextRegionType) -> bool {
    matches!(region_type, TextRegionType::Dimension | TextRegionType::Diameter)
}

fn merge_group(sorted: &[TextRegion], indices: &[usize]) -> TextRegion {
    if indices.len() == 1 {
        return sorted[indices[0]].clone();
    }

    let text = indices
        .iter()
        .map(|&i| sorted[i].text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let anchor_idx = indices
        .iter()
        .copied()
        .find(|&i| is_anchor(sorted[i].region_type))
        .unwrap_or(indices[0]);
    let anchor = &sorted[anchor_idx];

    TextRegion {
        text,
        region_type: anchor.region_type,
        confidence: indices.iter().map(|&i| sorted[i].confidence).sum::<f32>() / indices.len() as f32,
        bbox: anchor.bbox,
        center_pct: anchor.center_pct,
    }
}
