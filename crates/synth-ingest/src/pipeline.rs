use crate::chunking::chunk_text;
use crate::truncate::{truncate_for_embedding, EMBEDDING_INPUT_CEILING_CHARS};
use synth_core::{Chapter, Chunk, Result};
use synth_providers::ProviderGateway;
use tracing::{debug, info};

/// Runs steps (i)-(iv) of the Chapter Embedding Pipeline (§4.J) against a
/// freshly-ingested Chapter: truncates the extracted text to the embedding
/// input ceiling, embeds it, persists the embedding and model id onto the
/// Chapter, and — if the chapter's word count exceeds 4000 (§3 invariant,
/// boundary-case strict `>`) — splits it into overlapping chunks and
/// embeds each one. Does not touch storage; the caller (normally
/// `synth-tasks`) persists the mutated Chapter.
pub async fn embed_chapter(chapter: &mut Chapter, gateway: &ProviderGateway) -> Result<()> {
    let truncated = truncate_for_embedding(&chapter.text, EMBEDDING_INPUT_CEILING_CHARS);
    let embedding = gateway.generate_embedding(truncated).await?;
    info!(chapter_id = %chapter.id, dim = embedding.dim, model = %embedding.model_id, "chapter embedded");
    chapter.embedding = Some(embedding.vector);
    chapter.embedding_model = Some(embedding.model_id);

    if chapter.needs_chunking() {
        let raw_chunks = chunk_text(&chapter.text);
        debug!(chapter_id = %chapter.id, count = raw_chunks.len(), "chapter exceeds 4000 words, chunking for embedding");
        let mut chunks = Vec::with_capacity(raw_chunks.len());
        for (ordinal, raw) in raw_chunks.into_iter().enumerate() {
            let chunk_embedding = gateway.generate_embedding(&raw.text).await?;
            chunks.push(Chunk {
                ordinal,
                start_char: raw.start_char,
                end_char: raw.end_char,
                text: raw.text,
                preceding_heading: raw.preceding_heading,
                embedding: Some(chunk_embedding.vector),
            });
        }
        chapter.chunks = Some(chunks);
    } else {
        chapter.chunks = None;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::{ChapterSourceKind, CircuitBreakerConfig, SynthesisConfig};
    use synth_providers::{AiProvider, GenerationParams, ImageAnalysis, Message, ProviderCharacteristics, RoutingTable, StructuredGeneration, StructuredSchema, TaskTag, TextGeneration};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubEmbedder;

    #[async_trait]
    impl AiProvider for StubEmbedder {
        fn provider_id(&self) -> &str {
            "stub-embedder"
        }
        fn model_id(&self) -> &str {
            "stub-embed-model"
        }
        fn characteristics(&self) -> ProviderCharacteristics {
            ProviderCharacteristics { max_tokens: 8192, avg_latency_ms: 1, supports_structured_output: false, supports_vision: false, supports_embedding: true }
        }
        async fn generate_text(&self, _messages: &[Message], _params: &GenerationParams) -> Result<TextGeneration> {
            unimplemented!()
        }
        async fn generate_structured(&self, _messages: &[Message], _schema: &StructuredSchema, _params: &GenerationParams) -> Result<StructuredGeneration> {
            unimplemented!()
        }
        async fn generate_embedding(&self, text: &str) -> Result<synth_providers::EmbeddingGeneration> {
            Ok(synth_providers::EmbeddingGeneration {
                vector: vec![text.len() as f32, 1.0, 0.0],
                dim: 3,
                provider_id: "stub-embedder".to_string(),
                model_id: "stub-embed-model".to_string(),
                cost_usd: 0.0,
            })
        }
        async fn analyze_image(&self, _image_bytes: &[u8], _prompt: &str, _max_tokens: usize) -> Result<ImageAnalysis> {
            unimplemented!()
        }
        fn is_transient(&self, _error: &synth_core::SynthError) -> bool {
            false
        }
    }

    fn gateway() -> ProviderGateway {
        let mut table = RoutingTable::new();
        table.set_route(TaskTag::Embedding, vec!["stub-embedder".to_string()]);
        let mut gw = ProviderGateway::new(&SynthesisConfig::default(), table);
        gw.register(Arc::new(StubEmbedder), CircuitBreakerConfig::default());
        gw
    }

    #[tokio::test]
    async fn short_chapter_gets_embedding_but_no_chunks() {
        let mut chapter = Chapter::new("Intro", "A short chapter.", ChapterSourceKind::Textbook);
        embed_chapter(&mut chapter, &gateway()).await.unwrap();
        assert!(chapter.embedding.is_some());
        assert_eq!(chapter.embedding_model.as_deref(), Some("stub-embed-model"));
        assert!(chapter.chunks.is_none());
    }

    #[tokio::test]
    async fn long_chapter_gets_chunk_embeddings() {
        let body = (0..5000).map(|i| format!("Word{i}")).collect::<Vec<_>>().join(" ");
        let mut chapter = Chapter::new("Long", body, ChapterSourceKind::Standalone);
        assert!(chapter.needs_chunking());
        embed_chapter(&mut chapter, &gateway()).await.unwrap();
        let chunks = chapter.chunks.as_ref().unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.embedding.is_some()));
    }
}
