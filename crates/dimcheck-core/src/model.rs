//! The core data model shared by every pipeline stage (spec §3).
//!
//! Fields the source would have kept in an open dictionary are modeled as
//! tagged structs with explicit optional fields; anything an LLM hands back
//! that we don't have a field for survives in `extras` rather than being
//! dropped, so schema drift from a provider never silently loses data.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::Rect;

/// Side-channel for LLM-returned keys with no matching struct field.
pub type Extras = HashMap<String, Value>;

/// A rasterized drawing. Immutable after load; the canonical
/// `(width_px, height_px)` on this struct is the sole coordinate authority
/// for everything downstream (§9 "Coordinate authority").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub bytes: Vec<u8>,
    pub width_px: u32,
    pub height_px: u32,
    pub source_format: SourceFormat,
    /// Scale factor applied when rasterizing (2.0 for PDFs, per §4.1); 1.0 for
    /// natively-raster inputs.
    pub render_scale: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    Pdf,
    Png,
    Jpeg,
}

/// Light classification applied to raw OCR text by regex/heuristic only
/// (§4.2) — never by a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextRegionType {
    Dimension,
    Tolerance,
    ToleranceClass,
    Diameter,
    Radius,
    Angular,
    Thread,
    Chamfer,
    Depth,
    Thickness,
    Gdt,
    SectionLabel,
    SurfaceFinish,
    Material,
    #[default]
    Text,
}

/// A single text detection from either OCR detector (§4.2). Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRegion {
    pub text: String,
    #[serde(rename = "type")]
    pub region_type: TextRegionType,
    pub confidence: f32,
    pub bbox: Rect,
    pub center_pct: (f64, f64),
}

/// Which detector(s) contributed to a dimension's region (§4.5 region
/// refinement); `None` when no OCR-anchored region was ever found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    OcrDetected,
    CnnDetected,
    AiFallback,
    #[default]
    None,
}

impl DetectionMethod {
    /// The fixed confidence weight assigned per §4.5 region refinement.
    #[must_use]
    pub const fn base_confidence(self) -> f64 {
        match self {
            Self::OcrDetected => 0.85,
            Self::CnnDetected => 0.95,
            Self::AiFallback => 0.5,
            Self::None => 0.3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureType {
    Dimension,
    Diameter,
    Radius,
    Angular,
    Thread,
    Chamfer,
    Depth,
    Thickness,
    Other,
}

/// A flag recorded alongside a `Dimension` tracking which best-effort quality
/// step touched it (§3, §4.3). Kept as a set so later phases can add without
/// clobbering earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionFlag {
    OcrVerified,
    ValidationFailed,
    ValueNormalized,
    RegionOcrCorrected,
    SmallTextDetected,
    Reverified,
    CoordinateAdjusted,
    PossibleLetterContamination,
    PossibleMissingDecimal,
    UnlikelyDimensionRange,
}

/// Whether a dimension's `item_number` resolved against the BOM (§4.3 Phase D
/// "Build an entity registry").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    Verified,
    Unverified,
    Unbound,
}

/// A single extracted dimension. Mutated only by the Ingestor; frozen once
/// handed to the Comparator (§3 lifecycle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dimension {
    pub value: Option<f64>,
    pub unit: Unit,
    pub coordinates: (u32, u32),
    pub grid_ref: String,
    pub feature_type: FeatureType,
    pub tolerance_class: Option<String>,
    pub upper_tol: Option<f64>,
    pub lower_tol: Option<f64>,
    pub item_number: Option<String>,
    pub entity_description: Option<String>,
    pub binding_status: BindingStatus,
    pub confidence: f64,
    pub flags: HashSet<DimensionFlag>,
    pub zone: Option<String>,
    /// The value as originally read, kept only when region-OCR corrects a
    /// digit confusion (§4.3 Phase E).
    pub region_ocr_original: Option<f64>,
    pub extras: Extras,
}

impl Dimension {
    #[must_use]
    pub fn has_flag(&self, flag: DimensionFlag) -> bool {
        self.flags.contains(&flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Mm,
    In,
}

/// A bill-of-materials row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartListItem {
    pub item_number: String,
    pub description: String,
    pub material: String,
    pub quantity: i64,
    pub weight: Option<f64>,
    pub unit: String,
    pub extras: Extras,
}

/// A Geometric Dimensioning & Tolerancing callout (§GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GdtCallout {
    pub symbol: String,
    pub value: Option<f64>,
    pub datum: String,
    pub grid_ref: String,
    pub coordinates: (u32, u32),
    pub extras: Extras,
}

/// A named region of the drawing enriched with a grid span (§4.3 Phase D).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    pub grid_span: String,
    pub extras: Extras,
}

/// The structured semantic content of one drawing (§GLOSSARY), created per
/// drawing inside the Ingestor and frozen on handoff to the Comparator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineState {
    pub zones: Vec<Zone>,
    pub dimensions: Vec<Dimension>,
    pub part_list: Vec<PartListItem>,
    pub gdt_callouts: Vec<GdtCallout>,
    pub title_block: HashMap<String, String>,
    pub raw_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonStatus {
    Pass,
    Warning,
    Fail,
    Deviation,
    Missing,
    NotFound,
    Pending,
}

/// One row of the structured comparison output (§4.4), anchored to a
/// balloon number and (when available) a region on each drawing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonItem {
    pub balloon_number: u32,
    pub feature_description: String,
    pub master_nominal: Option<f64>,
    pub master_upper_tol: Option<f64>,
    pub master_lower_tol: Option<f64>,
    pub master_tolerance_class: Option<String>,
    pub check_actual: Option<f64>,
    pub deviation: Option<f64>,
    pub status: ComparisonStatus,
    pub master_coordinates: Option<(u32, u32)>,
    pub check_coordinates: Option<(u32, u32)>,
    pub master_region: Option<Rect>,
    pub check_region: Option<Rect>,
    pub zone: Option<String>,
    pub notes: String,
    pub requires_manual_review: bool,
    pub review_reason: Option<String>,
}

/// An overlay marker for one drawing, derived from a `ComparisonItem` for
/// rendering (§6 external interfaces).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balloon {
    pub balloon_number: u32,
    pub value: Option<f64>,
    pub unit: Option<Unit>,
    pub coordinates: (u32, u32),
    pub tolerance_class: Option<String>,
    pub nominal: Option<f64>,
    pub upper_tol: Option<f64>,
    pub lower_tol: Option<f64>,
    pub status: ComparisonStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewCategory {
    MissingDimension,
    MissingTolerance,
    ModifiedValue,
}

/// One item from the adversarial review path (§4.5). Created by Reviewer-A,
/// mutated through the audit/merge rounds, frozen after region refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewFinding {
    pub category: ReviewCategory,
    pub master_value: String,
    pub check_value: Option<String>,
    #[serde(rename = "type")]
    pub finding_type: String,
    pub location: String,
    pub description: String,
    pub master_region: Option<Rect>,
    pub check_region: Option<Rect>,
    /// Not part of the LLM's response schema — filled in by
    /// `region::refine_finding` after parsing, so it must deserialize to a
    /// sane default when absent from the raw round output.
    #[serde(default)]
    pub detection_method: DetectionMethod,
    #[serde(default)]
    pub coordinate_confidence: f64,
}

/// Output of the three-round adversarial protocol (§4.5), already
/// deduplicated and region-refined.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewResult {
    pub findings: Vec<ReviewFinding>,
    pub summary: String,
}

impl ReviewResult {
    #[must_use]
    pub fn missing_dimensions(&self) -> impl Iterator<Item = &ReviewFinding> {
        self.findings
            .iter()
            .filter(|f| f.category == ReviewCategory::MissingDimension)
    }

    #[must_use]
    pub fn modified_values(&self) -> impl Iterator<Item = &ReviewFinding> {
        self.findings
            .iter()
            .filter(|f| f.category == ReviewCategory::ModifiedValue)
    }
}

/// One entry in the append-only agent log carried alongside the pipeline's
/// immutable value chain (§9 "message passing").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub stage: String,
    pub kind: LogKind,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Thought,
    Finding,
    Complete,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total: u32,
    pub pass: u32,
    pub fail: u32,
    pub warning: u32,
    pub deviation: u32,
    pub missing: u32,
    pub gdt_issues: u32,
    pub bom_mismatches: u32,
    pub score: f64,
    pub status: PipelineStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    Ok,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimension_flag_set_accumulates() {
        let mut dim = sample_dimension();
        dim.flags.insert(DimensionFlag::OcrVerified);
        dim.flags.insert(DimensionFlag::SmallTextDetected);
        assert!(dim.has_flag(DimensionFlag::OcrVerified));
        assert!(dim.has_flag(DimensionFlag::SmallTextDetected));
        assert!(!dim.has_flag(DimensionFlag::Reverified));
    }

    fn sample_dimension() -> Dimension {
        Dimension {
            value: Some(25.0),
            unit: Unit::Mm,
            coordinates: (340, 550),
            grid_ref: "C4".into(),
            feature_type: FeatureType::Diameter,
            tolerance_class: Some("H7".into()),
            upper_tol: None,
            lower_tol: None,
            item_number: None,
            entity_description: None,
            binding_status: BindingStatus::Unbound,
            confidence: 0.95,
            flags: HashSet::new(),
            zone: None,
            region_ocr_original: None,
            extras: HashMap::new(),
        }
    }

    #[test]
    fn review_result_filters_by_category() {
        let result = ReviewResult {
            findings: vec![ReviewFinding {
                category: ReviewCategory::MissingDimension,
                master_value: "25.0".into(),
                check_value: None,
                finding_type: "diameter".into(),
                location: "Section A-A".into(),
                description: "missing".into(),
                master_region: None,
                check_region: None,
                detection_method: DetectionMethod::None,
                coordinate_confidence: 0.3,
            }],
            summary: String::new(),
        };
        assert_eq!(result.missing_dimensions().count(), 1);
        assert_eq!(result.modified_values().count(), 0);
    }
}
