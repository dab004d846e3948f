//! Ingestor (C3): produces a frozen `MachineState` per drawing in five
//! ordered phases (§4.3).

pub mod binding;
pub mod json_repair;
pub mod numeric;
pub mod providers;
pub mod raw;
pub mod rescue;
pub mod reverify;
pub mod vision;

use binding::EntityRegistry;
use dimcheck_core::error::IngestorError;
use dimcheck_core::log::EventSink;
use dimcheck_core::model::{
    BindingStatus, Dimension, Extras, FeatureType, GdtCallout, Image, LogKind, MachineState, PartListItem, Unit, Zone,
};
use dimcheck_core::provider::{ImagePart, JsonProvider};
use dimcheck_core::text::{normalize_text, FieldKind};
use dimcheck_ocr::OcrEngine;
use raw::{RawDimension, RawGdtCallout, RawPartListItem, RawZone};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{instrument, warn};

pub struct Ingestor<'a> {
    provider: &'a dyn JsonProvider,
    ocr_engine: Arc<OcrEngine>,
}

impl<'a> Ingestor<'a> {
    /// `ocr_engine` is taken as an `Arc` (§9 "OCR heaviness": a process-local
    /// singleton) so Phase E can hand it to `tokio::task::spawn_blocking`
    /// without borrowing across the blocking thread boundary.
    #[must_use]
    pub fn new(provider: &'a dyn JsonProvider, ocr_engine: Arc<OcrEngine>) -> Self {
        Self { provider, ocr_engine }
    }

    /// Run all five phases over one drawing image, producing a frozen
    /// `MachineState` (§4.3). Only vision-RPC exhaustion and an
    /// unparseable response are fatal; every Phase E sub-check degrades
    /// quality on failure without aborting.
    #[instrument(skip(self, image, sink))]
    pub async fn ingest(&self, image: &Image, small_text_detected: bool, sink: &dyn EventSink) -> Result<MachineState, IngestorError> {
        let image_part = ImagePart {
            png_bytes: image.bytes.clone(),
        };

        // Phase A
        let raw = vision::extract(self.provider, std::slice::from_ref(&image_part)).await?;

        // Phase B + C: build typed dimensions/part_list/zones/callouts,
        // normalizing string fields and validating numeric fields.
        let part_list = build_part_list(&raw.part_list);
        let (mut dimensions, dimension_pcts) = build_dimensions(&raw.dimensions);
        let mut gdt_callouts = build_gdt_callouts(&raw.gdt_callouts);
        let gdt_pcts: Vec<Option<(f64, f64)>> = raw
            .gdt_callouts
            .iter()
            .map(|c| c.coordinates.map(|p| (p.x, p.y)))
            .collect();
        let mut zones = build_zones(&raw.zones);

        // Phase D: spatial binding.
        let registry = EntityRegistry::build(&part_list);
        for (dimension, pct) in dimensions.iter_mut().zip(dimension_pcts.iter()) {
            let (x_pct, y_pct) = pct.unwrap_or((0.0, 0.0));
            binding::bind_dimension(dimension, x_pct, y_pct, image.width_px, image.height_px, &registry);
        }
        for (callout, pct) in gdt_callouts.iter_mut().zip(gdt_pcts.iter()) {
            let (x_pct, y_pct) = pct.unwrap_or((0.0, 0.0));
            binding::bind_gdt_callout(callout, x_pct, y_pct, image.width_px, image.height_px);
        }
        for (zone, raw_zone) in zones.iter_mut().zip(raw.zones.iter()) {
            if let (Some(start), Some(end)) = (raw_zone.start, raw_zone.end) {
                binding::enrich_zone_grid_span(zone, start.x, start.y, end.x, end.y, image.width_px, image.height_px);
            }
        }

        // Phase E: coordinate rescue, OCR cross-checks, focused re-verification.
        self.run_phase_e(image, &mut dimensions, small_text_detected).await;

        let binding_rate = ratio(dimensions.iter().filter(|d| d.binding_status == BindingStatus::Verified).count(), dimensions.len());
        let coordinate_rate =
            ratio(dimensions.iter().filter(|d| d.coordinates != (0, 0)).count(), dimensions.len());
        sink.publish(
            "ingestor",
            LogKind::Complete,
            serde_json::json!({
                "binding_rate": binding_rate,
                "coordinate_rate": coordinate_rate,
                "dimension_count": dimensions.len(),
            }),
        );

        Ok(MachineState {
            zones,
            dimensions,
            part_list,
            gdt_callouts,
            title_block: raw.title_block,
            raw_text: raw.raw_text,
        })
    }

    /// Coordinate rescue and OCR cross-checks are CPU-bound (Tesseract +
    /// ONNX inference, pixel-spiral ink sampling), so they run on
    /// `tokio::task::spawn_blocking` (§9) rather than inline on the reactor
    /// thread that drives the surrounding `tokio::join!` in the pipeline.
    /// The dimensions are handed to the blocking task as an owned clone and
    /// only written back on success, so a panicking OCR task never loses
    /// the pre-rescue state.
    async fn run_phase_e(&self, image: &Image, dimensions: &mut [Dimension], small_text_detected: bool) {
        let bytes = image.bytes.clone();
        let ocr_engine = Arc::clone(&self.ocr_engine);
        let snapshot = dimensions.to_vec();

        match tokio::task::spawn_blocking(move || rescue_blocking(&ocr_engine, &bytes, snapshot)).await {
            Ok(rescued) => dimensions.clone_from_slice(&rescued),
            Err(join_err) => {
                warn!(error = %join_err, "phase E OCR task panicked; leaving dimensions un-rescued");
            }
        }

        let image_part = ImagePart {
            png_bytes: image.bytes.clone(),
        };
        reverify::reverify_suspects(self.provider, std::slice::from_ref(&image_part), dimensions).await;

        if small_text_detected {
            rescue::apply_small_text_penalty(dimensions);
        }
    }
}

/// Runs OCR detection plus the per-dimension rescue/cross-check loop
/// against an owned snapshot of the dimensions, returning them rescued.
/// Everything here is synchronous CPU work; the caller is responsible for
/// running it through `spawn_blocking`.
fn rescue_blocking(ocr_engine: &OcrEngine, bytes: &[u8], mut dimensions: Vec<Dimension>) -> Vec<Dimension> {
    let Ok(dynamic) = image::load_from_memory(bytes) else {
        return dimensions;
    };
    let gray = dynamic.to_luma8();

    let ocr_output = ocr_engine.detect(&dynamic);
    let numeric_tokens: HashSet<String> = ocr_output
        .regions
        .iter()
        .flat_map(|r| r.text.split_whitespace())
        .filter(|t| t.chars().all(|c| c.is_ascii_digit() || c == '.'))
        .map(str::to_string)
        .collect();

    for dimension in dimensions.iter_mut() {
        rescue::rescue_coordinate(dimension, &gray);
        rescue::cross_check_against_ocr(dimension, &numeric_tokens);
        rescue::region_ocr_check(dimension, &gray);
    }

    dimensions
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

fn parse_feature_type(raw: Option<&str>) -> FeatureType {
    match raw.unwrap_or("") {
        "diameter" => FeatureType::Diameter,
        "radius" => FeatureType::Radius,
        "angular" => FeatureType::Angular,
        "thread" => FeatureType::Thread,
        "chamfer" => FeatureType::Chamfer,
        "depth" => FeatureType::Depth,
        "thickness" => FeatureType::Thickness,
        "dimension" => FeatureType::Dimension,
        _ => FeatureType::Other,
    }
}

fn parse_unit(raw: Option<&str>) -> Unit {
    match raw.unwrap_or("mm").to_ascii_lowercase().as_str() {
        "in" | "inch" | "inches" => Unit::In,
        _ => Unit::Mm,
    }
}

fn raw_value_as_string(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn build_dimensions(raw_dimensions: &[RawDimension]) -> (Vec<Dimension>, Vec<Option<(f64, f64)>>) {
    let mut dimensions = Vec::with_capacity(raw_dimensions.len());
    let mut pcts = Vec::with_capacity(raw_dimensions.len());

    for raw_dim in raw_dimensions {
        let raw_value_text = raw_value_as_string(&raw_dim.value);
        let tolerance_class = raw_dim
            .tolerance_class
            .as_deref()
            .map(|tc| normalize_text(tc, FieldKind::ToleranceClass));

        let mut dimension = Dimension {
            value: raw_dim.value.as_ref().and_then(|v| v.as_f64()),
            unit: parse_unit(raw_dim.unit.as_deref()),
            coordinates: (0, 0),
            grid_ref: String::new(),
            feature_type: parse_feature_type(raw_dim.feature_type.as_deref()),
            tolerance_class,
            upper_tol: raw_dim.upper_tol,
            lower_tol: raw_dim.lower_tol,
            item_number: raw_dim.item_number.clone(),
            entity_description: None,
            binding_status: BindingStatus::Unbound,
            confidence: 1.0,
            flags: HashSet::new(),
            zone: raw_dim.zone.clone(),
            region_ocr_original: None,
            extras: Extras::new(),
        };

        numeric::validate(&mut dimension, &raw_value_text);
        dimensions.push(dimension);
        pcts.push(raw_dim.coordinates.map(|p| (p.x, p.y)));
    }

    (dimensions, pcts)
}

fn build_part_list(raw_parts: &[RawPartListItem]) -> Vec<PartListItem> {
    raw_parts
        .iter()
        .map(|p| {
            let material = normalize_text(&p.material, FieldKind::DescriptionMaterial);
            let description = normalize_text(&p.description, FieldKind::DescriptionMaterial);
            PartListItem {
                item_number: p.item_number.clone(),
                description,
                material,
                quantity: p.quantity,
                weight: p.weight,
                unit: p.unit.clone(),
                extras: Extras::new(),
            }
        })
        .collect()
}

fn build_gdt_callouts(raw_callouts: &[RawGdtCallout]) -> Vec<GdtCallout> {
    raw_callouts
        .iter()
        .map(|c| GdtCallout {
            symbol: c.symbol.clone(),
            value: c.value,
            datum: if c.datum.chars().count() == 1 {
                normalize_text(&c.datum, FieldKind::Datum)
            } else {
                c.datum.clone()
            },
            grid_ref: String::new(),
            coordinates: (0, 0),
            extras: Extras::new(),
        })
        .collect()
}

fn build_zones(raw_zones: &[RawZone]) -> Vec<Zone> {
    raw_zones
        .iter()
        .map(|z| Zone {
            name: z.name.clone(),
            grid_span: String::new(),
            extras: Extras::new(),
        })
        .collect()
}
