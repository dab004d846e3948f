//! Focused LLM re-verification (§4.3 Phase E). Non-fatal: any provider
//! error here degrades quality but never aborts the ingestor.

use dimcheck_core::model::{Dimension, DimensionFlag};
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};
use serde::Deserialize;
use std::time::Duration;

const REVERIFY_MAX_TOKENS: usize = 4096;
const REVERIFY_TIMEOUT_SECS: u64 = 600;

/// Confidence floor below which a dimension is resubmitted for focused
/// re-verification, alongside any validation/OCR failure (§4.3).
const REVERIFY_CONFIDENCE_FLOOR: f64 = 0.7;

#[derive(Debug, Deserialize)]
struct Correction {
    #[allow(dead_code)]
    original_value: Option<f64>,
    corrected_value: Option<f64>,
    confidence: f64,
    correction_note: String,
}

/// A dimension's index in `MachineState::dimensions` is its identity
/// across this batch call — the LLM only ever sees a description.
fn needs_reverification(dimension: &Dimension) -> bool {
    dimension.flags.contains(&DimensionFlag::ValidationFailed)
        || !dimension.flags.contains(&DimensionFlag::OcrVerified)
        || dimension.confidence < REVERIFY_CONFIDENCE_FLOOR
}

/// Resubmit every suspect dimension in one batch call, applying
/// corrections in place. Swallows provider errors (§4.3: "non-fatal on
/// LLM error").
pub async fn reverify_suspects(provider: &dyn JsonProvider, image_parts: &[ImagePart], dimensions: &mut [Dimension]) {
    let suspect_indices: Vec<usize> = dimensions
        .iter()
        .enumerate()
        .filter(|(_, d)| needs_reverification(d))
        .map(|(i, _)| i)
        .collect();
    if suspect_indices.is_empty() {
        return;
    }

    let prompt = build_prompt(dimensions, &suspect_indices);
    let options = GenerateOptions {
        temperature: 0.1,
        max_tokens: REVERIFY_MAX_TOKENS,
        response_mime_json: true,
        safety_off: true,
        timeout: Duration::from_secs(REVERIFY_TIMEOUT_SECS),
    };

    let Ok(raw_text) = provider.generate_json(image_parts, &prompt, &options).await else {
        return;
    };
    let Ok(corrections) = serde_json::from_str::<Vec<Correction>>(&raw_text) else {
        return;
    };

    for (&idx, correction) in suspect_indices.iter().zip(corrections.iter()) {
        let Some(dimension) = dimensions.get_mut(idx) else { continue };
        if correction.correction_note != "confirmed" {
            if let Some(corrected) = correction.corrected_value {
                if Some(corrected) != dimension.value {
                    dimension.value = Some(corrected);
                }
            }
        }
        dimension.confidence = correction.confidence.clamp(0.0, 1.0);
        dimension.flags.insert(DimensionFlag::Reverified);
    }
}

fn build_prompt(dimensions: &[Dimension], suspect_indices: &[usize]) -> String {
    let mut prompt = String::from(
        "The following dimensions are suspect (failed validation, unverified by OCR, or low confidence). \
         For each, return {original_value, corrected_value, confidence, correction_note} in a JSON array, \
         in the same order. Use correction_note=\"confirmed\" when the original reading was correct.\n\n",
    );
    for &idx in suspect_indices {
        let dimension = &dimensions[idx];
        prompt.push_str(&format!(
            "- value={:?}, feature_type={:?}, location={:?}, flags={:?}\n",
            dimension.value, dimension.feature_type, dimension.grid_ref, dimension.flags
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dimcheck_core::error::ProviderError;
    use dimcheck_core::model::{BindingStatus, Extras, FeatureType, Unit};
    use std::collections::HashSet;

    fn suspect_dimension(value: f64) -> Dimension {
        Dimension {
            value: Some(value),
            unit: Unit::Mm,
            coordinates: (0, 0),
            grid_ref: "A1".to_string(),
            feature_type: FeatureType::Dimension,
            tolerance_class: None,
            upper_tol: None,
            lower_tol: None,
            item_number: None,
            entity_description: None,
            binding_status: BindingStatus::Unbound,
            confidence: 0.4,
            flags: HashSet::new(),
            zone: None,
            region_ocr_original: None,
            extras: Extras::new(),
        }
    }

    struct StubProvider(String);

    #[async_trait]
    impl JsonProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }
        async fn generate_json(
            &self,
            _image_parts: &[ImagePart],
            _prompt: &str,
            _options: &GenerateOptions,
        ) -> Result<String, ProviderError> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn applies_correction_and_marks_reverified() {
        let mut dims = vec![suspect_dimension(34.0)];
        let provider = StubProvider(
            r#"[{"original_value": 34.0, "corrected_value": 84.0, "confidence": 0.9, "correction_note": "digit confusion"}]"#
                .to_string(),
        );
        reverify_suspects(&provider, &[], &mut dims).await;
        assert_eq!(dims[0].value, Some(84.0));
        assert!(dims[0].flags.contains(&DimensionFlag::Reverified));
    }

    #[tokio::test]
    async fn confirmed_note_raises_confidence_without_changing_value() {
        let mut dims = vec![suspect_dimension(12.0)];
        let provider = StubProvider(
            r#"[{"original_value": 12.0, "corrected_value": 12.0, "confidence": 0.95, "correction_note": "confirmed"}]"#
                .to_string(),
        );
        reverify_suspects(&provider, &[], &mut dims).await;
        assert_eq!(dims[0].value, Some(12.0));
        assert_eq!(dims[0].confidence, 0.95);
    }

    #[tokio::test]
    async fn provider_error_is_non_fatal() {
        struct FailingProvider;
        #[async_trait]
        impl JsonProvider for FailingProvider {
            fn name(&self) -> &str {
                "failing"
            }
            async fn generate_json(
                &self,
                _image_parts: &[ImagePart],
                _prompt: &str,
                _options: &GenerateOptions,
            ) -> Result<String, ProviderError> {
                Err(ProviderError::Timeout)
            }
        }
        let mut dims = vec![suspect_dimension(12.0)];
        reverify_suspects(&FailingProvider, &[], &mut dims).await;
        assert_eq!(dims[0].confidence, 0.4);
    }

    #[test]
    fn confident_dimension_is_not_resubmitted() {
        let mut confident = suspect_dimension(12.0);
        confident.confidence = 0.95;
        confident.flags.insert(DimensionFlag::OcrVerified);
        assert!(!needs_reverification(&confident));
    }
}
