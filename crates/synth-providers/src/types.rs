use schemars::JsonSchema as JsonSchemaDerive;
use serde::{Deserialize, Serialize};

/// Closed set of task tags the routing table switches on (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskTag {
    ContentDrafting,
    FactVerification,
    MetadataExtraction,
    Vision,
    Embedding,
    Summarization,
    SourceRelevance,
}

impl TaskTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskTag::ContentDrafting => "content-drafting",
            TaskTag::FactVerification => "fact-verification",
            TaskTag::MetadataExtraction => "metadata-extraction",
            TaskTag::Vision => "vision",
            TaskTag::Embedding => "embedding",
            TaskTag::Summarization => "summarization",
            TaskTag::SourceRelevance => "source_relevance",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }
}

/// A JSON schema a `generate_structured` call must validate against.
/// Carries the schema name alongside the schema body because providers
/// with native structured-output support (OpenAI's `json_schema` response
/// format) require a name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredSchema {
    pub name: String,
    pub schema: serde_json::Value,
    pub strict: bool,
}

impl StructuredSchema {
    pub fn from_schemars<T: JsonSchemaDerive>(name: impl Into<String>) -> Self {
        let schema = schemars::schema_for!(T);
        Self {
            name: name.into(),
            schema: serde_json::to_value(schema).unwrap_or(serde_json::Value::Null),
            strict: true,
        }
    }
}

/// Parameters common to every generation call (§4.A contract).
#[derive(Debug, Clone)]
pub struct GenerationParams {
    pub task_tag: TaskTag,
    pub system_prompt: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            task_tag: TaskTag::ContentDrafting,
            system_prompt: None,
            max_tokens: 4096,
            temperature: 0.2,
        }
    }
}

/// Result of `generate_text` (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextGeneration {
    pub text: String,
    pub provider_id: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Result of `generate_structured` (§4.A): `data` is guaranteed schema-valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredGeneration {
    pub data: serde_json::Value,
    pub provider_id: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_usd: f64,
}

/// Result of `generate_embedding` (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingGeneration {
    pub vector: Vec<f32>,
    pub dim: usize,
    pub provider_id: String,
    pub model_id: String,
    pub cost_usd: f64,
}

/// Result of `analyze_image` (§4.A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub text: String,
    pub provider_id: String,
    pub model_id: String,
    pub cost_usd: f64,
}

/// Static properties a provider reports about itself (latency bucket,
/// whether it supports native schema enforcement, rate limits).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCharacteristics {
    pub max_tokens: usize,
    pub avg_latency_ms: u64,
    pub supports_structured_output: bool,
    pub supports_vision: bool,
    pub supports_embedding: bool,
}
