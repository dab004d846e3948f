//! Phase A — vision extraction (§4.3).

use crate::json_repair::parse_vision_response;
use crate::raw::RawExtraction;
use dimcheck_core::error::IngestorError;
use dimcheck_core::provider::{with_rate_limit_backoff, GenerateOptions, ImagePart, JsonProvider};
use std::time::Duration;

const VISION_TEMPERATURE: f32 = 0.1;
const VISION_MAX_TOKENS: usize = 8192;
const RPC_TIMEOUT_SECS: u64 = 600;

const EXTRACTION_PROMPT: &str = r#"You are extracting the machine-readable content of an engineering drawing.
Return a single JSON object with keys: dimensions, part_list, zones, gdt_callouts, title_block, raw_text.

Every coordinate MUST be expressed as a percentage of image width/height (0.0-1.0), not pixels.
Use exactly one feature_type per dimension: dimension, diameter, radius, angular, thread, chamfer, depth, thickness, other.

Character-disambiguation rules:
- Distinguish curved strokes from angled strokes (a '6' is not a 'b'; a '0' is not an angled diamond).
- Distinguish a flat-topped digit from a curved-topped digit (e.g. '5' vs 'S').
- Count loops precisely: an '8' has two loops, a '3' has none.
- Preserve letters exactly in tolerance_class, datum, and material/description fields;
  do not silently convert letters that look like digits in those fields.

Respond with JSON only, no commentary."#;

/// Call the vision LLM, retrying only on rate limits, and parse the
/// response through the JSON repair cascade (§4.3 Phase A).
pub async fn extract(provider: &dyn JsonProvider, image_parts: &[ImagePart]) -> Result<RawExtraction, IngestorError> {
    let options = GenerateOptions {
        temperature: VISION_TEMPERATURE,
        max_tokens: VISION_MAX_TOKENS,
        response_mime_json: true,
        safety_off: true,
        timeout: Duration::from_secs(RPC_TIMEOUT_SECS),
    };

    let raw_text = with_rate_limit_backoff(|| provider.generate_json(image_parts, EXTRACTION_PROMPT, &options))
        .await
        .map_err(|e| IngestorError::VisionRpcExhausted(e.to_string()))?;

    let value = parse_vision_response(&raw_text)
        .ok_or_else(|| IngestorError::ResponseUnparseable(raw_text.chars().take(500).collect()))?;

    serde_json::from_value(value).map_err(|e| IngestorError::ResponseUnparseable(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dimcheck_core::error::ProviderError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct StubProvider {
        response: String,
        calls: Arc<AtomicUsize>,
    }

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
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    #[tokio::test]
    async fn extracts_dimensions_from_well_formed_response() {
        let provider = StubProvider {
            response: r#"{"dimensions": [{"value": 12.5, "coordinates": {"x": 0.5, "y": 0.4}, "feature_type": "dimension"}]}"#
                .to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let result = extract(&provider, &[]).await.unwrap();
        assert_eq!(result.dimensions.len(), 1);
    }

    #[tokio::test]
    async fn unparseable_response_is_fatal() {
        let provider = StubProvider {
            response: "complete garbage, not json".to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let result = extract(&provider, &[]).await;
        assert!(matches!(result, Err(IngestorError::ResponseUnparseable(_))));
    }
}
