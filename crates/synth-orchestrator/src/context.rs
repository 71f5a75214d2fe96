//! Bundles the capability interfaces and configuration the orchestrator
//! depends on (§9 "the orchestrator code depends only on `publish`" and
//! the narrow traits in `synth_core::traits`).

use std::sync::Arc;
use synth_core::{ChapterStore, CheckpointStore, DocumentStore, EvidenceDatabase, LexicalIndex, SynthesisConfig, VectorIndex};
use synth_events::Publisher;
use synth_providers::ProviderGateway;
use synth_retrieval::EvidenceCache;

use crate::types::AvailableImage;

/// Everything a [`crate::orchestrator::SynthesisOrchestrator`] needs,
/// collected so the driver itself stays a thin dispatcher over the stage
/// modules (§4.H).
pub struct OrchestratorContext {
    pub config: SynthesisConfig,
    pub gateway: Arc<ProviderGateway>,
    pub documents: Arc<dyn DocumentStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub chapters: Arc<dyn ChapterStore>,
    pub vector_index: Arc<dyn VectorIndex>,
    pub lexical_index: Arc<dyn LexicalIndex>,
    pub evidence_db: Arc<dyn EvidenceDatabase>,
    pub evidence_cache: Arc<EvidenceCache>,
    pub publisher: Arc<dyn Publisher>,
    /// Corpus of images the PDF ingestion pipeline surfaced; Stage 3/7
    /// match against this set. Blob storage itself is out of scope (§1).
    pub available_images: Vec<AvailableImage>,
}
