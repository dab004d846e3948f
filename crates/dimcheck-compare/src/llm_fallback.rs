//! Phase 2 — LLM fallback matcher (§4.4). Unmatched master/check
//! dimensions are sent together to the reasoning LLM in one batch; only
//! matches at or above the acceptance threshold are taken.

use dimcheck_core::error::ComparatorError;
use dimcheck_core::model::Dimension;
use dimcheck_core::provider::{GenerateOptions, JsonProvider};
use serde::Deserialize;
use std::time::Duration;

/// Minimum confidence the LLM must report for a candidate match to be
/// accepted (§4.4 Phase 2).
pub const MATCH_ACCEPTANCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Deserialize)]
pub struct LlmMatch {
    pub master_index: usize,
    pub check_index: usize,
    pub confidence: f64,
    #[allow(dead_code)]
    pub reasoning: String,
}

/// Send unmatched master/check dimensions to the reasoning LLM and return
/// the accepted matches (indices are positions within the slices passed
/// in, not the original master/check arrays).
pub async fn resolve_unmatched(
    provider: &dyn JsonProvider,
    unmatched_master: &[&Dimension],
    unmatched_check: &[&Dimension],
) -> Result<Vec<LlmMatch>, ComparatorError> {
    if unmatched_master.is_empty() || unmatched_check.is_empty() {
        return Ok(Vec::new());
    }

    let prompt = build_prompt(unmatched_master, unmatched_check);
    let options = GenerateOptions {
        temperature: 0.1,
        max_tokens: 4096,
        response_mime_json: true,
        safety_off: true,
        timeout: Duration::from_secs(120),
    };

    let raw_text = provider
        .generate_json(&[], &prompt, &options)
        .await
        .map_err(|e| ComparatorError::MatchRpcFailed(e.to_string()))?;

    let matches: Vec<LlmMatch> =
        serde_json::from_str(&raw_text).map_err(|e| ComparatorError::MatchRpcFailed(e.to_string()))?;

    Ok(matches.into_iter().filter(|m| m.confidence >= MATCH_ACCEPTANCE_THRESHOLD).collect())
}

fn build_prompt(master: &[&Dimension], check: &[&Dimension]) -> String {
    let describe = |dims: &[&Dimension]| {
        dims.iter()
            .enumerate()
            .map(|(i, d)| format!("{i}: feature_type={:?}, value={:?}, coordinates={:?}, zone={:?}", d.feature_type, d.value, d.coordinates, d.zone))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "Match master dimensions to check dimensions. Weight feature type and position over value \
         (customizations routinely change values). Return a JSON array of \
         {{master_index, check_index, confidence, reasoning}}.\n\nMaster:\n{}\n\nCheck:\n{}\n",
        describe(master),
        describe(check)
    )
}
