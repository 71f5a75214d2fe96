use crate::provider::AiProvider;
use crate::types::{EmbeddingGeneration, GenerationParams, ImageAnalysis, Message, MessageRole, ProviderCharacteristics, StructuredGeneration, StructuredSchema, TextGeneration};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use synth_core::{Result, SynthError};

/// Any backend speaking the OpenAI Chat Completions + Embeddings wire
/// format: OpenAI itself, Azure OpenAI, or a local server (LM Studio,
/// Ollama's compatibility endpoint). Distinguished from [`crate::anthropic::AnthropicProvider`]
/// by native `response_format: json_schema` support, which lets
/// `generate_structured` skip client-side parsing.
///
/// `api_key` is a [`SecretString`] so a stray `{:?}` of the config never
/// leaks the credential; `Secret`'s own `Debug` impl prints a redacted
/// placeholder.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleConfig {
    pub base_url: String,
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<SecretString>,
    pub provider_name: String,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for OpenAiCompatibleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            api_key: std::env::var("OPENAI_API_KEY").ok().map(SecretString::from),
            provider_name: "openai".to_string(),
            connect_timeout_secs: 5,
            read_timeout_secs: 30,
        }
    }
}

pub struct OpenAiCompatibleProvider {
    config: OpenAiCompatibleConfig,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiCompatibleConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.read_timeout_secs))
            .build()
            .map_err(|e| SynthError::Configuration(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) if !key.expose_secret().is_empty() => builder.bearer_auth(key.expose_secret()),
            _ => builder,
        }
    }

    async fn chat_completion(&self, messages: &[Message], params: &GenerationParams, response_format: Option<ResponseFormat>) -> Result<ChatCompletionResponse> {
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        MessageRole::System => "system",
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                    }
                    .to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            response_format,
        };

        let response = self
            .auth(self.client.post(format!("{}/chat/completions", self.config.base_url)))
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(SynthError::ExternalServiceError(format!("{} {status}: {body}", self.config.provider_name)));
            }
            return Err(SynthError::ProviderUnavailable(format!("{} {status}: {body}", self.config.provider_name)));
        }

        response
            .json::<ChatCompletionResponse>()
            .await
            .map_err(|e| SynthError::ExternalServiceError(format!("failed to parse {} response: {e}", self.config.provider_name)))
    }
}

#[async_trait]
impl AiProvider for OpenAiCompatibleProvider {
    fn provider_id(&self) -> &str {
        &self.config.provider_name
    }

    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn characteristics(&self) -> ProviderCharacteristics {
        ProviderCharacteristics {
            max_tokens: 128_000,
            avg_latency_ms: 800,
            supports_structured_output: true,
            supports_vision: true,
            supports_embedding: true,
        }
    }

    async fn generate_text(&self, messages: &[Message], params: &GenerationParams) -> Result<TextGeneration> {
        let response = self.chat_completion(messages, params, None).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SynthError::ExternalServiceError(format!("{} returned no choices", self.config.provider_name)))?;

        Ok(TextGeneration {
            text: choice.message.content,
            provider_id: self.provider_id().to_string(),
            model_id: response.model,
            input_tokens: response.usage.prompt_tokens as u64,
            output_tokens: response.usage.completion_tokens as u64,
            cost_usd: 0.0,
        })
    }

    async fn generate_structured(
        &self,
        messages: &[Message],
        schema: &StructuredSchema,
        params: &GenerationParams,
    ) -> Result<StructuredGeneration> {
        let response_format = ResponseFormat::JsonSchema {
            json_schema: JsonSchemaSpec {
                name: schema.name.clone(),
                schema: schema.schema.clone(),
                strict: schema.strict,
            },
        };
        let response = self.chat_completion(messages, params, Some(response_format)).await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SynthError::ExternalServiceError(format!("{} returned no choices", self.config.provider_name)))?;

        let data: serde_json::Value = serde_json::from_str(&choice.message.content).map_err(|e| {
            SynthError::ProviderSchemaViolation(format!("{} output not valid JSON for schema '{}': {e}", self.config.provider_name, schema.name))
        })?;

        Ok(StructuredGeneration {
            data,
            provider_id: self.provider_id().to_string(),
            model_id: response.model,
            input_tokens: response.usage.prompt_tokens as u64,
            output_tokens: response.usage.completion_tokens as u64,
            cost_usd: 0.0,
        })
    }

    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingGeneration> {
        let request = EmbeddingRequest { model: self.config.embedding_model.clone(), input: text.to_string() };
        let response = self
            .auth(self.client.post(format!("{}/embeddings", self.config.base_url)))
            .json(&request)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SynthError::ExternalServiceError(format!("{} embeddings {status}: {body}", self.config.provider_name)));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| SynthError::ExternalServiceError(format!("failed to parse embedding response: {e}")))?;
        let vector = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| SynthError::ExternalServiceError("embedding response carried no vectors".to_string()))?;
        let dim = vector.len();

        Ok(EmbeddingGeneration {
            vector,
            dim,
            provider_id: self.provider_id().to_string(),
            model_id: self.config.embedding_model.clone(),
            cost_usd: 0.0,
        })
    }

    async fn analyze_image(&self, _image_bytes: &[u8], prompt: &str, max_tokens: usize) -> Result<ImageAnalysis> {
        let messages = vec![Message::user(prompt.to_string())];
        let response = self
            .chat_completion(&messages, &GenerationParams { max_tokens, ..Default::default() }, None)
            .await?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| SynthError::ExternalServiceError(format!("{} returned no choices", self.config.provider_name)))?;
        Ok(ImageAnalysis { text: choice.message.content, provider_id: self.provider_id().to_string(), model_id: response.model, cost_usd: 0.0 })
    }

    fn is_transient(&self, error: &SynthError) -> bool {
        matches!(error, SynthError::Timeout(_) | SynthError::ExternalServiceError(_))
    }
}

fn classify_reqwest_error(error: reqwest::Error) -> SynthError {
    if error.is_timeout() {
        SynthError::Timeout(Duration::from_secs(30))
    } else {
        SynthError::ExternalServiceError(error.to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseFormat {
    JsonSchema { json_schema: JsonSchemaSpec },
}

#[derive(Debug, Serialize)]
struct JsonSchemaSpec {
    name: String,
    schema: serde_json::Value,
    strict: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
    usage: ChatUsage,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_openai() {
        let config = OpenAiCompatibleConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert_eq!(config.provider_name, "openai");
    }
}
