//! Vision model client
//!
//! Builds a chat-completions request from a profile and a normalized JPEG,
//! sends it with a bounded timeout, and hands the raw structured output
//! back for validation. Every failure mode is surfaced as an opaque message
//! for the classifier; nothing is partially swallowed here.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

use crate::config::ModelConfig;
use crate::profiles::ProcessingProfile;

/// Fixed user-turn instruction accompanying the inline image
const USER_INSTRUCTION: &str =
    "Analyze this image and return the metadata as a single JSON object.";

#[derive(Debug, Error)]
#[error("{0}")]
pub struct GenerateError(pub String);

/// Seam between the pipeline and the external model so tests can substitute
/// a scripted generator.
#[async_trait]
pub trait MetadataGenerator: Send + Sync {
    /// Returns the model's raw structured output as a string
    async fn generate(
        &self,
        profile: &ProcessingProfile,
        jpeg: &[u8],
        api_key: &str,
    ) -> Result<String, GenerateError>;
}

/// OpenAI-compatible chat-completions client
pub struct OpenAiGenerator {
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct UpstreamErrorBody {
    error: UpstreamError,
}

#[derive(Deserialize)]
struct UpstreamError {
    message: String,
}

#[async_trait]
impl MetadataGenerator for OpenAiGenerator {
    async fn generate(
        &self,
        profile: &ProcessingProfile,
        jpeg: &[u8],
        api_key: &str,
    ) -> Result<String, GenerateError> {
        // Per-call client: the transport and its pooled connections are
        // dropped on every exit path when this scope ends.
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| GenerateError(format!("failed to build HTTP client: {e}")))?;

        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg));

        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": profile.prompt,
                },
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": USER_INSTRUCTION},
                        {"type": "image_url", "image_url": {"url": data_url}},
                    ],
                },
            ],
            "response_format": {"type": "json_object"},
        });

        debug!(model = %self.model, image_bytes = jpeg.len(), "Calling vision model");

        let response = client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerateError("model request timed out".to_string())
                } else if e.is_connect() {
                    GenerateError(format!("connection to model provider failed: {e}"))
                } else {
                    GenerateError(format!("model request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<UpstreamErrorBody>()
                .await
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    status.canonical_reason().unwrap_or("unknown error").to_string()
                });
            return Err(GenerateError(format!("HTTP {}: {detail}", status.as_u16())));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| GenerateError(format!("unreadable model response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerateError("model returned no choices".to_string()))
    }
}
