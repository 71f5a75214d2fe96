//! Wires an in-memory, offline-runnable [`OrchestratorContext`] together:
//! the [`DemoProvider`](crate::demo_provider::DemoProvider) registered on
//! every route, `synth_core::memory`'s in-memory stores, and a
//! [`TopicBroker`] as the event publisher. Stands in for whatever a
//! production deployment would wire up against a real database, vector
//! store, and hosted model provider (§1 Non-goals: persistence and
//! provider wiring are out of scope for the library crates themselves).

use std::sync::Arc;
use std::time::Duration;

use synth_core::memory::InMemoryBackend;
use synth_core::{CircuitBreakerConfig, SynthesisConfig};
use synth_events::TopicBroker;
use synth_orchestrator::OrchestratorContext;
use synth_providers::{default_routing_table, ProviderGateway};
use synth_retrieval::EvidenceCache;
use synth_tasks::BackgroundTaskAdapter;

use crate::demo_provider::DemoProvider;

/// Everything a CLI invocation needs: the orchestrator context plus the
/// background task adapter and the in-memory backend's `Arc`s, kept around
/// so a command can also hand a Chapter store or the vector index straight
/// to `synth-ingest` without re-registering providers.
pub struct Demo {
    pub ctx: OrchestratorContext,
    pub backend: InMemoryBackend,
    pub tasks: Arc<BackgroundTaskAdapter>,
}

pub fn build_demo(config: SynthesisConfig) -> Demo {
    let routing = default_routing_table(
        DemoProvider::PROVIDER_ID,
        DemoProvider::PROVIDER_ID,
        &[DemoProvider::PROVIDER_ID],
        DemoProvider::PROVIDER_ID,
    );

    let mut gateway = ProviderGateway::new(&config, routing);
    gateway.register(Arc::new(DemoProvider), CircuitBreakerConfig::default());
    let gateway = Arc::new(gateway);

    let backend = InMemoryBackend::default();
    let publisher = Arc::new(TopicBroker::default());
    let evidence_cache = Arc::new(EvidenceCache::new(Duration::from_secs(config.cache_ttl_secs)));

    let tasks = Arc::new(BackgroundTaskAdapter::new(backend.tasks.clone(), publisher.clone()));

    let ctx = OrchestratorContext {
        config,
        gateway,
        documents: backend.documents.clone(),
        checkpoints: backend.checkpoints.clone(),
        chapters: backend.chapters.clone(),
        vector_index: backend.vector_index.clone(),
        lexical_index: backend.lexical_index.clone(),
        evidence_db: backend.evidence_db.clone(),
        evidence_cache,
        publisher,
        available_images: Vec::new(),
    };

    Demo { ctx, backend, tasks }
}
