//! Pluggable AI backends behind a single [`gateway::ProviderGateway`]:
//! per-task routing, fallback, retry with backoff, circuit breaking, and
//! cost accounting (§4.A).

pub mod anthropic;
pub mod circuit_breaker;
pub mod gateway;
pub mod openai_compatible;
pub mod provider;
pub mod schemas;
pub mod types;

pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use gateway::{ProviderGateway, RoutingTable};
pub use openai_compatible::{OpenAiCompatibleConfig, OpenAiCompatibleProvider};
pub use provider::AiProvider;
pub use types::{
    EmbeddingGeneration, GenerationParams, ImageAnalysis, Message, MessageRole, ProviderCharacteristics,
    StructuredGeneration, StructuredSchema, TaskTag, TextGeneration,
};

/// Builds the default task-tag routing table described in §4.A: fast-cheap
/// provider for drafting/summarization, structured-output-capable provider
/// for fact-verification/metadata-extraction, vision-capable providers in
/// fallback order, and the embedding-capable provider for embeddings.
pub fn default_routing_table(fast_cheap: &str, structured: &str, vision_chain: &[&str], embedding: &str) -> RoutingTable {
    let mut table = RoutingTable::new();
    table.set_route(TaskTag::ContentDrafting, vec![fast_cheap.to_string()]);
    table.set_route(TaskTag::Summarization, vec![fast_cheap.to_string()]);
    table.set_route(TaskTag::FactVerification, vec![structured.to_string()]);
    table.set_route(TaskTag::MetadataExtraction, vec![structured.to_string()]);
    table.set_route(TaskTag::SourceRelevance, vec![structured.to_string()]);
    table.set_route(TaskTag::Vision, vision_chain.iter().map(|s| s.to_string()).collect());
    table.set_route(TaskTag::Embedding, vec![embedding.to_string()]);
    table
}
