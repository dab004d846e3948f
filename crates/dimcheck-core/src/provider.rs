//! Provider-agnostic LLM RPC contract (§6, §9 "Provider SDK coupling").
//!
//! Every model call the pipeline makes — vision extraction, reasoning
//! fallback, and the two adversarial-review model families — goes through
//! this trait. Concrete providers (OpenAI-style chat completions, AWS
//! Bedrock Claude) live in `dimcheck-ingest::providers` and implement it;
//! nothing upstream of this trait ever names a concrete SDK type.

use async_trait::async_trait;

use crate::error::ProviderError;

/// One image to attach to a vision-capable request.
#[derive(Debug, Clone)]
pub struct ImagePart {
    pub png_bytes: Vec<u8>,
}

/// Options accompanying a `generate_json` call (§6 RPC contract #1).
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub max_tokens: usize,
    /// Enforce a JSON MIME response where the provider supports it.
    pub response_mime_json: bool,
    /// Disable provider safety filters that misfire on engineering
    /// terminology (§9 open question). Providers without an equivalent
    /// knob treat this as a no-op.
    pub safety_off: bool,
    pub timeout: std::time::Duration,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 8192,
            response_mime_json: true,
            safety_off: false,
            timeout: std::time::Duration::from_secs(600),
        }
    }
}

/// The generic "send images and a prompt, get text back" contract every
/// model provider implements (§6, §9).
#[async_trait]
pub trait JsonProvider: Send + Sync {
    /// Human-readable provider/model identifier, used in logs and cost
    /// reporting.
    fn name(&self) -> &str;

    async fn generate_json(
        &self,
        image_parts: &[ImagePart],
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ProviderError>;
}

/// Maximum rate-limit retry attempts (§4.3 Phase A, §5 "Backoff").
pub const MAX_RATE_LIMIT_ATTEMPTS: u32 = 5;
/// Starting backoff, doubling each attempt.
pub const INITIAL_BACKOFF_SECS: u64 = 30;

/// Run `op` with the spec's rate-limit backoff: up to 5 attempts, starting
/// at 30s and doubling each time. Only [`ProviderError::RateLimited`] is
/// retried; any other error is fatal immediately.
pub async fn with_rate_limit_backoff<F, Fut, T>(op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    with_rate_limit_backoff_base(op, INITIAL_BACKOFF_SECS).await
}

async fn with_rate_limit_backoff_base<F, Fut, T>(
    mut op: F,
    initial_backoff_secs: u64,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(ProviderError::RateLimited) if attempt + 1 < MAX_RATE_LIMIT_ATTEMPTS => {
                let backoff = initial_backoff_secs * 2u64.pow(attempt);
                tracing::warn!(attempt, backoff, "rate limited, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(backoff)).await;
                attempt += 1;
            }
            Err(ProviderError::RateLimited) => {
                return Err(ProviderError::RateLimited);
            }
            Err(other) => return Err(other),
        }
    }
}
