use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::config::VisionConfig;
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::VisionModel;
use crate::llm::types::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, ContentPart, ImageUrl,
};

/// Chat-completions endpoint that accepts `image_url` parts (Hugging Face
/// router, vLLM, OpenAI and friends). Non-streaming.
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn from_config(id: impl Into<String>, cfg: &VisionConfig) -> PilotResult<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .ok_or_else(|| PilotError::Config("vision API key missing".into()))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            id: id.into(),
            api_base: cfg.api_base.clone(),
            api_key,
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            client,
        })
    }

    fn build_request(&self, image_jpeg: &[u8], prompt: &str) -> ChatCompletionRequest {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_jpeg);
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".into(),
                content: vec![
                    ContentPart::Text {
                        text: prompt.to_string(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{encoded}"),
                        },
                    },
                ],
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn complete(&self, image_jpeg: &[u8], prompt: &str) -> PilotResult<String> {
        let body = self.build_request(image_jpeg, prompt);

        tracing::debug!(
            provider = %self.id,
            model = %self.model,
            image_bytes = image_jpeg.len(),
            "sending vision request"
        );
        tracing::debug!(
            body = %sanitized_body(&body),
            "request body (sanitized, base64 omitted)"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::VisionModel(format!("{status}: {err_body}")));
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let text = parsed
            .first_text()
            .ok_or_else(|| PilotError::VisionModel("response carried no choices".into()))?;
        tracing::debug!(provider = %self.id, reply = %text, "vision reply received");
        Ok(text)
    }
}

/// JSON of `body` with every image payload replaced by a placeholder.
fn sanitized_body(body: &ChatCompletionRequest) -> String {
    let mut log_body = match serde_json::to_value(body) {
        Ok(v) => v,
        Err(_) => return String::new(),
    };
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("image_url") {
                    if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                        *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                    }
                }
            }
        }
    }
    log_body.to_string()
}
