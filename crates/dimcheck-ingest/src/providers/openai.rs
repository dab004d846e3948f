//! An OpenAI-compatible chat-completions `JsonProvider` (§6, §9). Also
//! serves any OpenAI-API-shaped endpoint (`OPENAI_API_BASE` override), the
//! way the teacher client was itself configurable.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use dimcheck_core::error::ProviderError;
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};
use serde::{Deserialize, Serialize};
use std::env;

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: usize,
    temperature: f32,
    response_format: Option<ResponseFormat>,
    /// Set when `GenerateOptions.safety_off` is true, to tell a
    /// self-hosted/Azure-style endpoint to omit its content-filter
    /// categories for this call (§9 "safety filter bypass"). The public
    /// OpenAI API ignores unknown fields, so this is harmless against it.
    #[serde(skip_serializing_if = "Option::is_none")]
    moderation: Option<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
struct ImageUrl {
    url: String,
    detail: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiProvider {
    /// Reads `OPENAI_API_KEY` (required) and `OPENAI_API_BASE` (optional,
    /// defaults to the public API) from the environment.
    pub fn new(model: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Rpc("OPENAI_API_KEY environment variable not set".into()))?;
        let base_url =
            env::var("OPENAI_API_BASE").unwrap_or_else(|_| "https://api.openai.com/v1".to_string());
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| ProviderError::Rpc(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: model.into(),
            api_key,
            http_client,
            base_url,
        })
    }
}

#[async_trait]
impl JsonProvider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_json(
        &self,
        image_parts: &[ImagePart],
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        let mut content = vec![ContentPart::Text {
            text: prompt.to_string(),
        }];
        for part in image_parts {
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:image/png;base64,{}", STANDARD.encode(&part.png_bytes)),
                    detail: "high".to_string(),
                },
            });
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            response_format: options
                .response_mime_json
                .then(|| ResponseFormat {
                    format_type: "json_object".to_string(),
                }),
            moderation: options.safety_off.then_some("omit"),
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(options.timeout)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Rpc(format!("failed to read response body: {e}")))?;
        if !status.is_success() {
            return Err(ProviderError::Rpc(format!("HTTP {status}: {text}")));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Rpc(format!("malformed chat response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.is_empty())
            .ok_or(ProviderError::TruncatedEmpty)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout
    } else {
        ProviderError::Rpc(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn new_requires_api_key() {
        let saved = env::var("OPENAI_API_KEY").ok();
        env::remove_var("OPENAI_API_KEY");

        let result = OpenAiProvider::new("gpt-4o");
        assert!(result.is_err());

        if let Some(key) = saved {
            env::set_var("OPENAI_API_KEY", key);
        }
    }

    #[test]
    #[serial]
    fn new_succeeds_with_key_and_custom_base() {
        env::set_var("OPENAI_API_KEY", "test-key");
        env::set_var("OPENAI_API_BASE", "https://custom.example.com/v1");

        let provider = OpenAiProvider::new("gpt-4o").unwrap();
        assert_eq!(provider.base_url, "https://custom.example.com/v1");

        env::remove_var("OPENAI_API_KEY");
        env::remove_var("OPENAI_API_BASE");
    }
}
