//! In-memory reference implementations of the capability traits in
//! [`crate::traits`]. These stand in for the transactional store, the
//! vector index, and the task table in tests and in the `synth-cli` demo
//! binary; a production deployment swaps them for real backends without
//! the orchestrator code changing (§9 Design Notes).

use crate::entities::{Book, Chapter, Checkpoint, Document, StageBlob, Task};
use crate::error::Result;
use crate::traits::{
    AnnCandidate, ChapterStore, CheckpointStore, DocumentStore, EvidenceDatabase, EvidenceRecord,
    LexicalIndex, TaskStore, VectorIndex,
};
use crate::types::EntityId;
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    documents: DashMap<EntityId, Document>,
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn create(&self, document: Document) -> Result<()> {
        self.documents.insert(document.id, document);
        Ok(())
    }

    async fn get(&self, id: EntityId) -> Result<Option<Document>> {
        Ok(self.documents.get(&id).map(|d| d.clone()))
    }

    async fn update(&self, document: Document) -> Result<()> {
        self.documents.insert(document.id, document);
        Ok(())
    }

    async fn delete(&self, id: EntityId) -> Result<()> {
        self.documents.remove(&id);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCheckpointStore {
    checkpoints: DashMap<(EntityId, u8), StageBlob>,
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn write(&self, checkpoint: Checkpoint) -> Result<()> {
        self.checkpoints
            .insert((checkpoint.document_id, checkpoint.stage), checkpoint.value);
        Ok(())
    }

    async fn get(&self, document_id: EntityId, stage: u8) -> Result<Option<StageBlob>> {
        Ok(self.checkpoints.get(&(document_id, stage)).map(|v| v.clone()))
    }

    async fn last_committed_stage(&self, document_id: EntityId) -> Result<Option<u8>> {
        Ok((1..=14u8)
            .filter(|stage| self.checkpoints.contains_key(&(document_id, *stage)))
            .max())
    }
}

#[derive(Default)]
pub struct InMemoryChapterStore {
    books: DashMap<EntityId, Book>,
    chapters: DashMap<EntityId, Chapter>,
}

#[async_trait]
impl ChapterStore for InMemoryChapterStore {
    async fn create_book(&self, book: Book) -> Result<()> {
        self.books.insert(book.id, book);
        Ok(())
    }

    async fn create_chapter(&self, chapter: Chapter) -> Result<()> {
        self.chapters.insert(chapter.id, chapter);
        Ok(())
    }

    async fn get_chapter(&self, id: EntityId) -> Result<Option<Chapter>> {
        Ok(self.chapters.get(&id).map(|c| c.clone()))
    }

    async fn update_chapter(&self, chapter: Chapter) -> Result<()> {
        self.chapters.insert(chapter.id, chapter);
        Ok(())
    }

    async fn list_chapters(&self) -> Result<Vec<Chapter>> {
        Ok(self.chapters.iter().map(|c| c.clone()).collect())
    }

    async fn delete_book(&self, id: EntityId) -> Result<()> {
        self.books.remove(&id);
        self.chapters.retain(|_, c| c.book_id != Some(id));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: DashMap<EntityId, Task>,
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(&self, task: Task) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn get(&self, id: EntityId) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn update(&self, task: Task) -> Result<()> {
        self.tasks.insert(task.id, task);
        Ok(())
    }

    async fn reap_before(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let before: Vec<EntityId> = self
            .tasks
            .iter()
            .filter(|t| t.completed_at.map(|c| c < cutoff).unwrap_or(false))
            .map(|t| t.id)
            .collect();
        let count = before.len() as u64;
        for id in before {
            self.tasks.remove(&id);
        }
        Ok(count)
    }
}

/// Brute-force cosine-similarity index. Adequate for tests and the demo
/// CLI; a real deployment's ANN engine is out of scope (§1).
#[derive(Default)]
pub struct InMemoryVectorIndex {
    vectors: DashMap<EntityId, Vec<f32>>,
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<AnnCandidate>> {
        let mut scored: Vec<AnnCandidate> = self
            .vectors
            .iter()
            .map(|entry| AnnCandidate {
                chapter_id: *entry.key(),
                cosine_similarity: cosine(query_embedding, entry.value()),
            })
            .collect();
        scored.sort_by(|a, b| b.cosine_similarity.partial_cmp(&a.cosine_similarity).unwrap());
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn upsert(&self, chapter_id: EntityId, embedding: Vec<f32>) -> Result<()> {
        self.vectors.insert(chapter_id, embedding);
        Ok(())
    }
}

/// Naive token-overlap lexical index (Jaccard over whitespace tokens).
#[derive(Default)]
pub struct InMemoryLexicalIndex {
    texts: DashMap<EntityId, String>,
}

impl InMemoryLexicalIndex {
    pub fn index(&self, chapter_id: EntityId, text: impl Into<String>) {
        self.texts.insert(chapter_id, text.into());
    }
}

#[async_trait]
impl LexicalIndex for InMemoryLexicalIndex {
    async fn overlap_score(&self, query: &str, chapter_id: EntityId) -> Result<f32> {
        let Some(text) = self.texts.get(&chapter_id) else {
            return Ok(0.0);
        };
        let q: std::collections::HashSet<String> =
            query.split_whitespace().map(|s| s.to_lowercase()).collect();
        let t: std::collections::HashSet<String> =
            text.split_whitespace().map(|s| s.to_lowercase()).collect();
        if q.is_empty() || t.is_empty() {
            return Ok(0.0);
        }
        let intersection = q.intersection(&t).count() as f32;
        let union = q.union(&t).count() as f32;
        Ok(intersection / union)
    }
}

/// Fixed-corpus stand-in for an external literature database (§4.B evidence
/// track), used in tests and the demo CLI. A production deployment swaps
/// this for a real PubMed-style client behind the same trait.
#[derive(Default)]
pub struct InMemoryEvidenceDatabase {
    records: DashMap<String, EvidenceRecord>,
}

impl InMemoryEvidenceDatabase {
    pub fn seed(&self, record: EvidenceRecord) {
        self.records.insert(record.external_id.clone(), record);
    }
}

#[async_trait]
impl EvidenceDatabase for InMemoryEvidenceDatabase {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<EvidenceRecord>> {
        let q: Vec<String> = query.split_whitespace().map(|s| s.to_lowercase()).collect();
        let mut scored: Vec<(usize, EvidenceRecord)> = self
            .records
            .iter()
            .map(|entry| {
                let record = entry.value().clone();
                let haystack = format!(
                    "{} {}",
                    record.title.to_lowercase(),
                    record.abstract_text.clone().unwrap_or_default().to_lowercase()
                );
                let hits = q.iter().filter(|w| haystack.contains(w.as_str())).count();
                (hits, record)
            })
            .filter(|(hits, _)| *hits > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(max_results);
        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }
}

/// Convenience bundle so callers that want "the in-memory backend" don't
/// need to wire up five separate `Arc`s by hand.
pub struct InMemoryBackend {
    pub documents: std::sync::Arc<InMemoryDocumentStore>,
    pub checkpoints: std::sync::Arc<InMemoryCheckpointStore>,
    pub chapters: std::sync::Arc<InMemoryChapterStore>,
    pub tasks: std::sync::Arc<InMemoryTaskStore>,
    pub vector_index: std::sync::Arc<InMemoryVectorIndex>,
    pub lexical_index: std::sync::Arc<InMemoryLexicalIndex>,
    pub evidence_db: std::sync::Arc<InMemoryEvidenceDatabase>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self {
            documents: Default::default(),
            checkpoints: Default::default(),
            chapters: Default::default(),
            tasks: Default::default(),
            vector_index: Default::default(),
            lexical_index: Default::default(),
            evidence_db: Default::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Document;
    use crate::types::DocumentType;

    #[tokio::test]
    async fn document_store_roundtrip() {
        let store = InMemoryDocumentStore::default();
        let doc = Document::new("topic", DocumentType::PureAnatomy);
        let id = doc.id;
        store.create(doc).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.id, id);
    }

    #[tokio::test]
    async fn checkpoint_store_tracks_last_committed_stage() {
        let store = InMemoryCheckpointStore::default();
        let doc_id = uuid::Uuid::new_v4();
        assert_eq!(store.last_committed_stage(doc_id).await.unwrap(), None);
        store
            .write(Checkpoint { document_id: doc_id, stage: 3, value: serde_json::json!({}), written_at: chrono::Utc::now() })
            .await
            .unwrap();
        assert_eq!(store.last_committed_stage(doc_id).await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn vector_index_ranks_by_cosine_similarity() {
        let index = InMemoryVectorIndex::default();
        let a = uuid::Uuid::new_v4();
        let b = uuid::Uuid::new_v4();
        index.upsert(a, vec![1.0, 0.0]).await.unwrap();
        index.upsert(b, vec![0.0, 1.0]).await.unwrap();
        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results[0].chapter_id, a);
    }
}
