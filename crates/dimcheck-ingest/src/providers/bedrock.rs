//! An AWS Bedrock `JsonProvider` for Claude models, via the Converse API
//! (grounded on the teacher's `BedrockClient`). `safety_off` is a no-op
//! here — Bedrock's Claude models have no per-call safety-category knob
//! (§9 open question).

use async_trait::async_trait;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::types::{ContentBlock, ConversationRole, ImageBlock, ImageFormat, ImageSource, Message};
use aws_sdk_bedrockruntime::Client;
use dimcheck_core::error::ProviderError;
use dimcheck_core::provider::{GenerateOptions, ImagePart, JsonProvider};

pub struct BedrockProvider {
    client: Client,
    model_id: String,
}

impl BedrockProvider {
    pub async fn new(model_id: impl Into<String>) -> Result<Self, ProviderError> {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self {
            client: Client::new(&config),
            model_id: model_id.into(),
        })
    }
}

#[async_trait]
impl JsonProvider for BedrockProvider {
    fn name(&self) -> &str {
        &self.model_id
    }

    async fn generate_json(
        &self,
        image_parts: &[ImagePart],
        prompt: &str,
        options: &GenerateOptions,
    ) -> Result<String, ProviderError> {
        let mut builder = Message::builder().role(ConversationRole::User);

        for part in image_parts {
            let image_block = ImageBlock::builder()
                .format(ImageFormat::Png)
                .source(ImageSource::Bytes(Blob::new(part.png_bytes.clone())))
                .build()
                .map_err(|e| ProviderError::Rpc(format!("failed to build image block: {e}")))?;
            builder = builder.content(ContentBlock::Image(image_block));
        }
        builder = builder.content(ContentBlock::Text(prompt.to_string()));

        let message = builder
            .build()
            .map_err(|e| ProviderError::Rpc(format!("failed to build message: {e}")))?;

        let response = tokio::time::timeout(
            options.timeout,
            self.client
                .converse()
                .model_id(&self.model_id)
                .messages(message)
                .send(),
        )
        .await
        .map_err(|_| ProviderError::Timeout)?
        .map_err(map_bedrock_error)?;

        let output = response
            .output()
            .ok_or_else(|| ProviderError::Rpc("Bedrock response had no output".into()))?;
        let message = output
            .as_message()
            .map_err(|_| ProviderError::Rpc("Bedrock output was not a message".into()))?;

        message
            .content()
            .iter()
            .find_map(|block| block.as_text().ok().map(ToString::to_string))
            .filter(|s| !s.is_empty())
            .ok_or(ProviderError::TruncatedEmpty)
    }
}

fn map_bedrock_error<E: std::fmt::Debug>(err: E) -> ProviderError {
    let message = format!("{err:?}");
    if message.contains("Throttling") || message.contains("TooManyRequests") {
        ProviderError::RateLimited
    } else {
        ProviderError::Rpc(message)
    }
}
