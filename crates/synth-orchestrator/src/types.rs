//! Per-stage checkpoint blob shapes and the in-process working state that
//! lets a resumed run reconstruct stage 1..N-1 context without re-invoking
//! those stages (§4.H, §8 scenario 5).

use serde::{Deserialize, Serialize};
use synth_core::{EntityId, Reference, Source};
use synth_providers::schemas::{ChapterAnalysisOutput, ContextBuildingOutput, PlannedSection};

/// An image available for Stage 7 matching. Blob storage is out of scope
/// (§1); the orchestrator only needs the keyword metadata a storage layer
/// would hand back, not image bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableImage {
    pub id: EntityId,
    pub keywords: Vec<String>,
    pub caption_hint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage3Blob {
    pub sources: Vec<Source>,
    pub matched_image_ids: Vec<EntityId>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage4Blob {
    pub sources: Vec<Source>,
    pub evidence_subset_count: usize,
    pub ai_subset_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage5Blob {
    pub sections: Vec<PlannedSection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage8Blob {
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage9Blob {
    pub depth: f32,
    pub coverage: f32,
    pub currency: f32,
    pub evidence: f32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage11Blob {
    pub toc_markdown: String,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage13Blob {
    pub version: String,
    pub total_words: usize,
    pub section_count: usize,
    pub reference_count: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage14Blob {
    pub document_id: EntityId,
    pub status: String,
}

/// Context carried in-process across a single `run()` invocation, lazily
/// rebuilt from persisted checkpoint blobs on resume (§4.H "in-stage work
/// is idempotent at the stage granularity only"; nothing above stage
/// granularity re-runs).
#[derive(Debug, Clone, Default)]
pub struct WorkingState {
    pub stage1: Option<ChapterAnalysisOutput>,
    pub stage2: Option<ContextBuildingOutput>,
    pub internal_sources: Vec<Source>,
    pub matched_image_ids: Vec<EntityId>,
    pub external_sources: Vec<Source>,
    pub planned_sections: Vec<PlannedSection>,
}

impl WorkingState {
    /// All retrieved sources (internal + external), in first-seen order,
    /// the shared listing Stage 6 allocates from and Stage 8 numbers.
    pub fn all_sources(&self) -> Vec<Source> {
        self.internal_sources.iter().cloned().chain(self.external_sources.iter().cloned()).collect()
    }
}
