use crate::entities::{Book, Chapter, Checkpoint, Document, StageBlob, Task};
use crate::error::Result;
use crate::types::EntityId;
use async_trait::async_trait;

/// The transactional store is the only authoritative state (§5
/// Shared-resource policy). `DocumentStore` is the narrow capability
/// interface the orchestrator uses instead of depending on the relational
/// schema directly (§1 Non-goals: the schema itself is out of scope).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create(&self, document: Document) -> Result<()>;
    async fn get(&self, id: EntityId) -> Result<Option<Document>>;
    async fn update(&self, document: Document) -> Result<()>;
    async fn delete(&self, id: EntityId) -> Result<()>;
}

/// Append-only checkpoint log, one entry per (document, stage). Backs both
/// resume-after-crash and streaming diffs (§3 Checkpoint, §4.H).
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn write(&self, checkpoint: Checkpoint) -> Result<()>;
    async fn get(&self, document_id: EntityId, stage: u8) -> Result<Option<StageBlob>>;
    /// Highest committed stage for a document, or `None` if no checkpoint
    /// has been written yet. Drives resume-from-checkpoint (§4.H, §8 scenario 5).
    async fn last_committed_stage(&self, document_id: EntityId) -> Result<Option<u8>>;
}

/// Books own Chapters; delete cascades (§3 Lifecycle).
#[async_trait]
pub trait ChapterStore: Send + Sync {
    async fn create_book(&self, book: Book) -> Result<()>;
    async fn create_chapter(&self, chapter: Chapter) -> Result<()>;
    async fn get_chapter(&self, id: EntityId) -> Result<Option<Chapter>>;
    async fn update_chapter(&self, chapter: Chapter) -> Result<()>;
    async fn list_chapters(&self) -> Result<Vec<Chapter>>;
    async fn delete_book(&self, id: EntityId) -> Result<()>;
}

/// Task rows created by the Background Task Adapter, mutated by workers
/// (§3 Task, §4.I).
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, task: Task) -> Result<()>;
    async fn get(&self, id: EntityId) -> Result<Option<Task>>;
    async fn update(&self, task: Task) -> Result<()>;
    /// Tasks completed/failed/cancelled before this retention cutoff may be
    /// reaped (§3 Lifecycle).
    async fn reap_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64>;
}

/// A single approximate-nearest-neighbor candidate.
#[derive(Debug, Clone)]
pub struct AnnCandidate {
    pub chapter_id: EntityId,
    pub cosine_similarity: f32,
}

/// The vector index is read-only from the orchestrator's perspective
/// during synthesis; writes happen only via the Chapter Embedding
/// Pipeline (§5 Shared-resource policy). Its implementation (e.g. an ANN
/// library) is an external collaborator out of scope for this crate (§1);
/// only this narrow interface is depended on.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<AnnCandidate>>;
    async fn upsert(&self, chapter_id: EntityId, embedding: Vec<f32>) -> Result<()>;
}

/// Lexical (keyword) search over Chapter text, feeding the hybrid score's
/// `lexical_overlap` term (§4.B).
#[async_trait]
pub trait LexicalIndex: Send + Sync {
    async fn overlap_score(&self, query: &str, chapter_id: EntityId) -> Result<f32>;
}

/// One record returned by the external literature database (§4.B evidence
/// track). Distinct from [`crate::entities::Source`]: this is the narrow
/// shape the external collaborator hands back, before it is lifted into a
/// Source by the retrieval service.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct EvidenceRecord {
    pub external_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    pub abstract_text: Option<String>,
}

/// The external literature database the evidence track (§4.B) searches
/// against. Byte-level HTTP client and the database itself are out of
/// scope (§1); this is the narrow capability interface.
#[async_trait]
pub trait EvidenceDatabase: Send + Sync {
    /// Issues a search and fetches structured records for up to `max_results`
    /// hits, most-relevant first.
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceRecord>>;
}
