use crate::types::{EmbeddingGeneration, GenerationParams, ImageAnalysis, Message, ProviderCharacteristics, StructuredGeneration, StructuredSchema, TextGeneration};
use async_trait::async_trait;
use synth_core::Result;

/// A single AI backend (§4.A). Concrete providers (Anthropic, an
/// OpenAI-compatible endpoint, ...) implement this; the [`crate::gateway::ProviderGateway`]
/// is the only thing the rest of the workspace talks to.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    fn model_id(&self) -> &str;

    fn characteristics(&self) -> ProviderCharacteristics;

    async fn generate_text(&self, messages: &[Message], params: &GenerationParams) -> Result<TextGeneration>;

    /// Providers without native schema enforcement should still return this
    /// error rather than a best-effort parse when validation fails; the
    /// gateway treats a `ProviderSchemaViolation` as retryable up to the
    /// provider's own retry budget, then surfaces it (§4.A: "the call fails
    /// after retries rather than returning best-effort parse").
    async fn generate_structured(
        &self,
        messages: &[Message],
        schema: &StructuredSchema,
        params: &GenerationParams,
    ) -> Result<StructuredGeneration>;

    async fn generate_embedding(&self, text: &str) -> Result<EmbeddingGeneration>;

    async fn analyze_image(&self, image_bytes: &[u8], prompt: &str, max_tokens: usize) -> Result<ImageAnalysis>;

    /// Whether a failure kind is worth retrying against this same provider
    /// before falling back (timeouts, 5xx, rate-limit vs. bad input).
    fn is_transient(&self, error: &synth_core::SynthError) -> bool {
        matches!(
            error,
            synth_core::SynthError::Timeout(_) | synth_core::SynthError::ExternalServiceError(_)
        )
    }
}
