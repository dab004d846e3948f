//! The vision LLM's promised JSON shape (§4.3 Phase A), deserialized
//! leniently — every field the prompt asks for is optional here so a
//! partially-repaired response still yields whatever it managed to say.

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawExtraction {
    #[serde(default)]
    pub dimensions: Vec<RawDimension>,
    #[serde(default)]
    pub part_list: Vec<RawPartListItem>,
    #[serde(default)]
    pub zones: Vec<RawZone>,
    #[serde(default)]
    pub gdt_callouts: Vec<RawGdtCallout>,
    #[serde(default)]
    pub title_block: HashMap<String, String>,
    #[serde(default)]
    pub raw_text: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDimension {
    pub value: Option<Value>,
    #[serde(default)]
    pub unit: Option<String>,
    pub coordinates: Option<RawPct>,
    #[serde(default)]
    pub feature_type: Option<String>,
    #[serde(default)]
    pub tolerance_class: Option<String>,
    #[serde(default)]
    pub upper_tol: Option<f64>,
    #[serde(default)]
    pub lower_tol: Option<f64>,
    #[serde(default)]
    pub item_number: Option<String>,
    #[serde(default)]
    pub zone: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RawPct {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawPartListItem {
    pub item_number: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "ea".to_string()
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawZone {
    pub name: String,
    #[serde(default)]
    pub start: Option<RawPct>,
    #[serde(default)]
    pub end: Option<RawPct>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawGdtCallout {
    pub symbol: String,
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub datum: String,
    pub coordinates: Option<RawPct>,
}
