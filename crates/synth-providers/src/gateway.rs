use crate::circuit_breaker::CircuitBreaker;
use crate::provider::AiProvider;
use crate::types::{EmbeddingGeneration, GenerationParams, ImageAnalysis, Message, StructuredGeneration, StructuredSchema, TaskTag, TextGeneration};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use synth_core::{ModelRates, ProviderTuning, Result, SynthError, SynthesisConfig};
use tracing::{debug, warn};

/// Task-tag -> ordered provider-id preference list (§4.A routing table).
/// Configuration, not hard-coded: built from whatever order providers were
/// registered in for each tag, but exposed so callers can override it.
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    routes: HashMap<TaskTag, Vec<String>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_route(&mut self, tag: TaskTag, provider_ids: Vec<String>) -> &mut Self {
        self.routes.insert(tag, provider_ids);
        self
    }

    pub fn providers_for(&self, tag: TaskTag) -> &[String] {
        self.routes.get(&tag).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

struct Registered {
    provider: Arc<dyn AiProvider>,
    breaker: CircuitBreaker,
}

/// Uniform entry point for every AI call in the workspace (§4.A). Wraps a
/// set of concrete [`AiProvider`]s with per-task routing, provider-level
/// retry with bounded exponential backoff, a fallback chain across
/// providers, a circuit breaker per provider, and cost accounting against
/// configured per-model rates.
pub struct ProviderGateway {
    providers: HashMap<String, Registered>,
    routing: RoutingTable,
    model_rates: HashMap<String, ModelRates>,
    tuning: ProviderTuning,
}

impl ProviderGateway {
    pub fn new(config: &SynthesisConfig, routing: RoutingTable) -> Self {
        Self {
            providers: HashMap::new(),
            routing,
            model_rates: config.model_rates.clone(),
            tuning: config.provider_tuning,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn AiProvider>, breaker_config: synth_core::CircuitBreakerConfig) {
        let id = provider.provider_id().to_string();
        self.providers.insert(id, Registered { provider, breaker: CircuitBreaker::new(breaker_config) });
    }

    fn cost_for(&self, model_id: &str, input_tokens: u64, output_tokens: u64, fallback: f64) -> f64 {
        match self.model_rates.get(model_id) {
            Some(rates) => {
                (input_tokens as f64 / 1000.0) * rates.in_rate_per_1k
                    + (output_tokens as f64 / 1000.0) * rates.out_rate_per_1k
            }
            None => fallback,
        }
    }

    /// Runs `op` against each provider in `tag`'s preference list in turn,
    /// honoring each provider's circuit breaker and retrying transient
    /// failures with bounded exponential backoff before moving to the next
    /// provider (§4.A Fallback, Retries, Circuit breaker).
    async fn run_with_fallback<T, F, Fut>(&self, tag: TaskTag, mut op: F) -> Result<T>
    where
        F: FnMut(Arc<dyn AiProvider>) -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let candidate_ids = self.routing.providers_for(tag);
        if candidate_ids.is_empty() {
            return Err(SynthError::ProviderUnavailable(format!(
                "no providers configured for task '{}'",
                tag.as_str()
            )));
        }

        let mut last_error = None;
        for provider_id in candidate_ids {
            let Some(registered) = self.providers.get(provider_id) else {
                warn!(provider_id, "routing table references unregistered provider");
                continue;
            };

            if !registered.breaker.allow_call() {
                debug!(provider_id, "circuit open, skipping to next provider");
                continue;
            }

            let mut attempt = 0u32;
            loop {
                match op(registered.provider.clone()).await {
                    Ok(value) => {
                        registered.breaker.record_success();
                        return Ok(value);
                    }
                    Err(error) => {
                        let transient = registered.provider.is_transient(&error);
                        if !transient {
                            registered.breaker.record_failure();
                            last_error = Some(error);
                            break;
                        }
                        attempt += 1;
                        if attempt >= self.tuning.max_retries {
                            registered.breaker.record_failure();
                            last_error = Some(error);
                            break;
                        }
                        let base_ms = 1000u64 << (attempt - 1);
                        let jitter_ms = rand::rng().random_range(0..=base_ms / 4 + 1);
                        let delay = Duration::from_millis(base_ms + jitter_ms);
                        warn!(provider_id, attempt, ?delay, "transient provider error, retrying");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            SynthError::ProviderUnavailable(format!("all providers exhausted for task '{}'", tag.as_str()))
        }))
    }

    pub async fn generate_text(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<TextGeneration> {
        let mut messages = Vec::new();
        if let Some(system) = &params.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt.to_string()));

        let mut result = self
            .run_with_fallback(params.task_tag, |provider| {
                let messages = messages.clone();
                let params = params.clone();
                async move { provider.generate_text(&messages, &params).await }
            })
            .await?;
        result.cost_usd = self.cost_for(&result.model_id, result.input_tokens, result.output_tokens, result.cost_usd);
        Ok(result)
    }

    pub async fn generate_structured(
        &self,
        prompt: &str,
        schema: &StructuredSchema,
        params: &GenerationParams,
    ) -> Result<StructuredGeneration> {
        let mut messages = Vec::new();
        if let Some(system) = &params.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt.to_string()));

        let mut result = self
            .run_with_fallback(params.task_tag, |provider| {
                let messages = messages.clone();
                let params = params.clone();
                let schema = schema.clone();
                async move { provider.generate_structured(&messages, &schema, &params).await }
            })
            .await?;
        result.cost_usd = self.cost_for(&result.model_id, result.input_tokens, result.output_tokens, result.cost_usd);
        Ok(result)
    }

    pub async fn generate_embedding(&self, text: &str) -> Result<EmbeddingGeneration> {
        let text = text.to_string();
        let mut result = self
            .run_with_fallback(TaskTag::Embedding, |provider| {
                let text = text.clone();
                async move { provider.generate_embedding(&text).await }
            })
            .await?;
        result.cost_usd = self.cost_for(&result.model_id, result.vector.len() as u64, 0, result.cost_usd);
        Ok(result)
    }

    pub async fn analyze_image(&self, image_bytes: &[u8], prompt: &str, max_tokens: usize) -> Result<ImageAnalysis> {
        let bytes = image_bytes.to_vec();
        let prompt = prompt.to_string();
        self.run_with_fallback(TaskTag::Vision, |provider| {
            let bytes = bytes.clone();
            let prompt = prompt.clone();
            async move { provider.analyze_image(&bytes, &prompt, max_tokens).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProviderCharacteristics;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyProvider {
        id: &'static str,
        fails_until: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl AiProvider for FlakyProvider {
        fn provider_id(&self) -> &str {
            self.id
        }

        fn model_id(&self) -> &str {
            "test-model"
        }

        fn characteristics(&self) -> ProviderCharacteristics {
            ProviderCharacteristics {
                max_tokens: 4096,
                avg_latency_ms: 1,
                supports_structured_output: true,
                supports_vision: false,
                supports_embedding: false,
            }
        }

        async fn generate_text(&self, _messages: &[Message], _params: &GenerationParams) -> Result<TextGeneration> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fails_until {
                return Err(SynthError::Timeout(Duration::from_secs(1)));
            }
            Ok(TextGeneration {
                text: "ok".to_string(),
                provider_id: self.id.to_string(),
                model_id: "test-model".to_string(),
                input_tokens: 10,
                output_tokens: 10,
                cost_usd: 0.0,
            })
        }

        async fn generate_structured(
            &self,
            _messages: &[Message],
            _schema: &StructuredSchema,
            _params: &GenerationParams,
        ) -> Result<StructuredGeneration> {
            unimplemented!()
        }

        async fn generate_embedding(&self, _text: &str) -> Result<EmbeddingGeneration> {
            unimplemented!()
        }

        async fn analyze_image(&self, _image_bytes: &[u8], _prompt: &str, _max_tokens: usize) -> Result<ImageAnalysis> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn retries_transient_failures_before_succeeding() {
        let config = SynthesisConfig::default();
        let mut routing = RoutingTable::new();
        routing.set_route(TaskTag::ContentDrafting, vec!["flaky".to_string()]);
        let mut gateway = ProviderGateway::new(&config, routing);
        gateway.register(
            Arc::new(FlakyProvider { id: "flaky", fails_until: 2, calls: AtomicU32::new(0) }),
            synth_core::CircuitBreakerConfig::default(),
        );

        let result = gateway
            .generate_text("hello", &GenerationParams { task_tag: TaskTag::ContentDrafting, ..Default::default() })
            .await
            .unwrap();
        assert_eq!(result.text, "ok");
    }

    #[tokio::test]
    async fn exhausting_fallback_chain_surfaces_provider_unavailable() {
        let config = SynthesisConfig::default();
        let mut routing = RoutingTable::new();
        routing.set_route(TaskTag::ContentDrafting, vec!["flaky".to_string()]);
        let mut gateway = ProviderGateway::new(&config, routing);
        gateway.register(
            Arc::new(FlakyProvider { id: "flaky", fails_until: 1000, calls: AtomicU32::new(0) }),
            synth_core::CircuitBreakerConfig::default(),
        );

        let result = gateway
            .generate_text("hello", &GenerationParams { task_tag: TaskTag::ContentDrafting, ..Default::default() })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn unrouted_task_tag_fails_fast() {
        let config = SynthesisConfig::default();
        let gateway = ProviderGateway::new(&config, RoutingTable::new());
        let result = gateway
            .generate_text("hello", &GenerationParams { task_tag: TaskTag::Vision, ..Default::default() })
            .await;
        assert!(matches!(result, Err(SynthError::ProviderUnavailable(_))));
    }
}
