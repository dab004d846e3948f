//! Pipeline configuration from the environment (§6, §9.1 ambient-stack
//! decisions), mirroring the corpus's `VerificationConfig::from_env()`.

use std::env;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub use_cnn_ocr: bool,
    pub ocr_consensus_threshold: i32,
    pub cnn_min_confidence: f64,
    pub vision_model: String,
    pub reasoning_model: String,
    pub adversarial_model_a: String,
    pub adversarial_model_b: String,
    pub pipeline_timeout_secs: u64,
    pub rpc_timeout_secs: u64,
}

impl PipelineConfig {
    /// Build a `PipelineConfig` from the environment variables named in
    /// §6, falling back to the documented defaults for anything unset or
    /// unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let use_cnn_ocr = env::var("USE_CNN_OCR").ok().and_then(|s| s.parse().ok()).unwrap_or(true);

        let ocr_consensus_threshold = env::var("CNN_OCR_CONSENSUS_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        let cnn_min_confidence = env::var("CNN_OCR_MIN_CONFIDENCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.7);

        let vision_model = env::var("VISION_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let reasoning_model = env::var("REASONING_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());
        let adversarial_model_a = env::var("ADVERSARIAL_MODEL_A").unwrap_or_else(|_| "gpt-4o".to_string());
        let adversarial_model_b =
            env::var("ADVERSARIAL_MODEL_B").unwrap_or_else(|_| "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string());

        let pipeline_timeout_secs = env::var("DIMCHECK_PIPELINE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1800);

        let rpc_timeout_secs = env::var("DIMCHECK_RPC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(600);

        Self {
            use_cnn_ocr,
            ocr_consensus_threshold,
            cnn_min_confidence,
            vision_model,
            reasoning_model,
            adversarial_model_a,
            adversarial_model_b,
            pipeline_timeout_secs,
            rpc_timeout_secs,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            use_cnn_ocr: true,
            ocr_consensus_threshold: 2,
            cnn_min_confidence: 0.7,
            vision_model: "gpt-4o".to_string(),
            reasoning_model: "gpt-4o".to_string(),
            adversarial_model_a: "gpt-4o".to_string(),
            adversarial_model_b: "anthropic.claude-3-5-sonnet-20241022-v2:0".to_string(),
            pipeline_timeout_secs: 1800,
            rpc_timeout_secs: 600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert!(config.use_cnn_ocr);
        assert_eq!(config.ocr_consensus_threshold, 2);
        assert_eq!(config.pipeline_timeout_secs, 1800);
        assert_eq!(config.rpc_timeout_secs, 600);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("USE_CNN_OCR", "false");
        env::set_var("CNN_OCR_CONSENSUS_THRESHOLD", "3");
        env::set_var("CNN_OCR_MIN_CONFIDENCE", "0.9");
        env::set_var("DIMCHECK_PIPELINE_TIMEOUT_SECS", "600");
        env::set_var("DIMCHECK_RPC_TIMEOUT_SECS", "120");

        let config = PipelineConfig::from_env();
        assert!(!config.use_cnn_ocr);
        assert_eq!(config.ocr_consensus_threshold, 3);
        assert!((config.cnn_min_confidence - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.pipeline_timeout_secs, 600);
        assert_eq!(config.rpc_timeout_secs, 120);

        env::remove_var("USE_CNN_OCR");
        env::remove_var("CNN_OCR_CONSENSUS_THRESHOLD");
        env::remove_var("CNN_OCR_MIN_CONFIDENCE");
        env::remove_var("DIMCHECK_PIPELINE_TIMEOUT_SECS");
        env::remove_var("DIMCHECK_RPC_TIMEOUT_SECS");
    }
}
