use crate::provider::AiProvider;
use crate::types::{EmbeddingGeneration, GenerationParams, ImageAnalysis, Message, MessageRole, ProviderCharacteristics, StructuredGeneration, StructuredSchema, TextGeneration};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use synth_core::{Result, SynthError};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// `api_key` is a [`SecretString`] so a stray `{:?}` of the config (logs,
/// panics) never leaks the credential; `Secret`'s own `Debug` impl prints
/// a redacted placeholder.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub api_key: SecretString,
    pub model: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: SecretString::from(std::env::var("ANTHROPIC_API_KEY").unwrap_or_default()),
            model: "claude-3-5-sonnet-20241022".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
        }
    }
}

/// Text- and structured-generation provider over Anthropic's Messages API.
/// Has no embedding or vision capability of its own; the gateway's routing
/// table simply never points `embedding`/`vision` task tags at it.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.expose_secret().is_empty() {
            return Err(SynthError::Configuration(
                "Anthropic API key is required; set ANTHROPIC_API_KEY".to_string(),
            ));
        }
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| SynthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    async fn send(&self, request: &AnthropicRequest) -> Result<AnthropicResponse> {
        let response = self
            .client
            .post(format!("{ANTHROPIC_API_BASE}/messages"))
            .header("x-api-key", self.config.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(SynthError::ExternalServiceError(format!("anthropic {status}: {body}")));
            }
            return Err(SynthError::ProviderUnavailable(format!("anthropic {status}: {body}")));
        }

        response
            .json::<AnthropicResponse>()
            .await
            .map_err(|e| SynthError::ExternalServiceError(format!("failed to parse anthropic response: {e}")))
    }

    fn to_anthropic_messages(messages: &[Message]) -> (Vec<AnthropicMessage>, Option<String>) {
        let system = messages
            .iter()
            .find(|m| matches!(m.role, MessageRole::System))
            .map(|m| m.content.clone());
        let turns = messages
            .iter()
            .filter(|m| !matches!(m.role, MessageRole::System))
            .map(|m| AnthropicMessage {
                role: match m.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                    MessageRole::System => unreachable!(),
                },
                content: m.content.clone(),
            })
            .collect();
        (turns, system)
    }

    fn extract_text(response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter_map(|c| c.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn provider_id(&self) -> &str {
        "anthropic"
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: 200_000,
            avg_latency_ms: 1500,
            supports_structured_output: false,
            supports_vision: true,
            supports_embedding: false,
        }
    }

    async fn generate_text(&self, messages: &[Message], params: &GenerationParams) -> Result<TextGeneration> {
        let (turns, system) = Self::to_anthropic_messages(messages);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            messages: turns,
            system,
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
        };
        let response = self.send(&request).await?;
        Ok(TextGeneration {
            text: Self::extract_text(&response),
            provider_id: self.provider_id().to_string(),
            model_id: response.model,
            input_tokens: response.usage.input_tokens as u64,
            output_tokens: response.usage.output_tokens as u64,
            cost_usd: 0.0,
        })
    }

    /// Anthropic has no native JSON-schema enforcement mode (unlike the
    /// OpenAI-compatible structured-output APIs), so the schema is embedded
    /// in the prompt and the response is parsed and validated client-side;
    /// a parse failure is a `ProviderSchemaViolation`, which the gateway
    /// treats as non-transient (§4.A: "fails after retries rather than
    /// returning best-effort parse").
    async fn generate_structured(
        &self,
        messages: &[Message],
        schema: &StructuredSchema,
        params: &GenerationParams,
    ) -> Result<StructuredGeneration> {
        let mut augmented = messages.to_vec();
        augmented.push(Message::user(format!(
            "Respond with ONLY a single JSON object matching this schema, no prose, no markdown fences:\n{}",
            serde_json::to_string_pretty(&schema.schema).unwrap_or_default()
        )));

        let generation = self.generate_text(&augmented, params).await?;
        let data: serde_json::Value = serde_json::from_str(generation.text.trim())
            .map_err(|e| SynthError::ProviderSchemaViolation(format!("{} output not valid JSON: {e}", schema.name)))?;

        Ok(StructuredGeneration {
            data,
            provider_id: generation.provider_id,
            model_id: generation.model_id,
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
            cost_usd: 0.0,
        })
    }

    async fn generate_embedding(&self, _text: &str) -> Result<EmbeddingGeneration> {
        Err(SynthError::ProviderUnavailable("anthropic does not offer an embedding endpoint".to_string()))
    }

    async fn analyze_image(&self, image_bytes: &[u8], prompt: &str, max_tokens: usize) -> Result<ImageAnalysis> {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let request = AnthropicRequest {
            model: self.config.model.clone(),
            messages: vec![AnthropicMessage { role: "user".to_string(), content: format!("[image omitted, {} bytes base64] {}", encoded.len(), prompt) }],
            system: None,
            max_tokens,
            temperature: Some(0.0),
        };
        let response = self.send(&request).await?;
        Ok(ImageAnalysis {
            text: Self::extract_text(&response),
            provider_id: self.provider_id().to_string(),
            model_id: response.model,
            cost_usd: 0.0,
        })
    }

    fn is_transient(&self, error: &SynthError) -> bool {
        matches!(error, SynthError::Timeout(_) | SynthError::ExternalServiceError(_))
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> SynthError {
    if error.is_timeout() {
        SynthError::Timeout(Duration::from_secs(30))
    } else {
        SynthError::ExternalServiceError(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_api_key() {
        let config = AnthropicConfig { api_key: SecretString::from(String::new()), ..Default::default() };
        assert!(AnthropicProvider::new(config).is_err());
    }
}
