use crate::error::{Result, SynthError};
use crate::types::{
    DocumentType, EntityId, GenerationStatus, SectionType, Severity, SourceType, TaskStatus,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn now() -> DateTime<Utc> {
    Utc::now()
}

/// An image placement inside a Section (§3 Section attributes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePlacement {
    pub image_id: EntityId,
    pub caption: String,
    pub relevance_score: f32,
}

/// The synthesized artifact's structural unit. Forms a recursive tree,
/// depth <= 4, per §9's "prefer a single record type over distinct
/// Section/Subsection types" design note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub ordinal: usize,
    pub title: String,
    pub section_type: SectionType,
    pub content: String,
    pub word_count: usize,
    pub children: Vec<Section>,
    pub images: Vec<ImagePlacement>,
    pub source_ids: Vec<EntityId>,
    /// Set when Stage 6 recorded a per-section generation failure; the
    /// section still carries placeholder content and does not abort the
    /// pipeline (§4.H Stage 6, §8 scenario 3).
    pub generation_error: Option<String>,
}

impl Section {
    pub fn new(ordinal: usize, title: impl Into<String>, section_type: SectionType) -> Self {
        Self {
            ordinal,
            title: title.into(),
            section_type,
            content: String::new(),
            word_count: 0,
            children: Vec::new(),
            images: Vec::new(),
            source_ids: Vec::new(),
            generation_error: None,
        }
    }

    /// Sets content and recomputes `word_count` as its invariant demands
    /// (§3: "word_count equals the whitespace-split length of content").
    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = content.into();
        self.word_count = content.split_whitespace().count();
        self.content = content;
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|c| c.depth())
            .max()
            .unwrap_or(0)
    }

    /// Total word count across this section and all descendants.
    pub fn total_word_count(&self) -> usize {
        self.word_count + self.children.iter().map(|c| c.total_word_count()).sum::<usize>()
    }

    /// Validates the §3 invariants that are local to a single tree:
    /// depth <= 4 and word_count consistency.
    pub fn validate(&self) -> Result<()> {
        if self.depth() > 4 {
            return Err(SynthError::SchemaInvariant(format!(
                "section '{}' exceeds max depth of 4",
                self.title
            )));
        }
        let expected = self.content.split_whitespace().count();
        if expected != self.word_count {
            return Err(SynthError::SchemaInvariant(format!(
                "section '{}' word_count {} does not match content ({})",
                self.title, self.word_count, expected
            )));
        }
        for child in &self.children {
            child.validate()?;
        }
        Ok(())
    }
}

/// A uniform record for an indexed local corpus item, an external
/// literature entry, or an AI-summarized "researched" item (§3 Source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: EntityId,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub journal: Option<String>,
    /// doi/pmid/url — whichever identifier the source carries.
    pub external_id: Option<String>,
    pub abstract_text: Option<String>,
    pub source_type: SourceType,
    /// Lexical-similarity score against the query, when computed.
    pub lexical_score: Option<f32>,
    /// Model-assigned relevance score (§4.D Relevance Filter), when computed.
    pub relevance_score: Option<f32>,
    pub embedding: Option<Vec<f32>>,
    pub dedup_hash: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_of: Option<EntityId>,
    /// Alternative titles merged in during deduplication (§4.C merge policy).
    pub alternative_titles: Vec<String>,
    pub duplicate_count: u32,
    /// Which dedup strategy flagged this survivor, for observability.
    pub dedup_strategy_label: Option<String>,
}

impl Source {
    pub fn new(title: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            authors: Vec::new(),
            year: None,
            journal: None,
            external_id: None,
            abstract_text: None,
            source_type,
            lexical_score: None,
            relevance_score: None,
            embedding: None,
            dedup_hash: None,
            is_duplicate: false,
            duplicate_of: None,
            alternative_titles: Vec::new(),
            duplicate_count: 0,
            dedup_strategy_label: None,
        }
    }

    /// Combined 0..=1 fit score used by the hybrid retrieval ranking.
    pub fn best_relevance(&self) -> f32 {
        self.relevance_score.unwrap_or(self.lexical_score.unwrap_or(0.0))
    }
}

/// A citation record derived from a Source, numbered within a Document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reference {
    pub reference_number: u32,
    pub source_id: EntityId,
    pub title: String,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub source_type: SourceType,
    pub external_id: Option<String>,
}

/// Four quality scores in [0,1], each independently produced by Stage 9
/// (§4.H Stage 9).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QualityScores {
    pub depth: f32,
    pub coverage: f32,
    pub currency: f32,
    pub evidence: f32,
}

impl QualityScores {
    pub fn all_in_unit_interval(&self) -> bool {
        [self.depth, self.coverage, self.currency, self.evidence]
            .iter()
            .all(|s| (0.0..=1.0).contains(s))
    }
}

/// One opaque structured blob per stage (§3 Document attributes). Stored
/// as `serde_json::Value` so additive-only schema evolution (§6) never
/// requires a migration of already-persisted blobs.
pub type StageBlob = serde_json::Value;

/// The synthesized artifact (§3 Document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: EntityId,
    pub topic: String,
    pub document_type: DocumentType,
    pub status: GenerationStatus,
    pub stage_blobs: [Option<StageBlob>; 14],
    pub sections: Vec<Section>,
    pub references: Vec<Reference>,
    pub quality_scores: QualityScores,
    pub gap_analysis: Option<StageBlob>,
    pub fact_check: Option<StageBlob>,
    pub version: String,
    pub parent_document_id: Option<EntityId>,
    pub is_current_version: bool,
    pub last_error: Option<String>,
    pub last_stage_attempted: Option<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn new(topic: impl Into<String>, document_type: DocumentType) -> Self {
        let ts = now();
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            document_type,
            status: GenerationStatus::initial(),
            stage_blobs: Default::default(),
            sections: Vec::new(),
            references: Vec::new(),
            quality_scores: QualityScores::default(),
            gap_analysis: None,
            fact_check: None,
            version: "0.0".to_string(),
            parent_document_id: None,
            is_current_version: false,
            last_error: None,
            last_stage_attempted: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    /// Index into `stage_blobs` for a 1-based stage ordinal.
    fn blob_index(stage: u8) -> Result<usize> {
        if !(1..=14).contains(&stage) {
            return Err(SynthError::SchemaInvariant(format!(
                "stage ordinal {} out of range 1..=14",
                stage
            )));
        }
        Ok((stage - 1) as usize)
    }

    /// Records a completed stage's output and advances `status`,
    /// enforcing "stage N's output blob must be non-null before status
    /// advances past stage N" (§3 Invariants).
    pub fn commit_stage(&mut self, stage: u8, blob: StageBlob) -> Result<()> {
        let idx = Self::blob_index(stage)?;
        self.stage_blobs[idx] = Some(blob);
        self.status = if stage == 14 {
            GenerationStatus::Completed
        } else {
            GenerationStatus::Stage(stage + 1)
        };
        self.last_stage_attempted = Some(stage);
        self.updated_at = now();
        Ok(())
    }

    pub fn mark_failed(&mut self, stage: u8, error: impl Into<String>) {
        self.status = GenerationStatus::Failed;
        self.last_stage_attempted = Some(stage);
        self.last_error = Some(error.into());
        self.updated_at = now();
    }

    pub fn stage_blob(&self, stage: u8) -> Option<&StageBlob> {
        Self::blob_index(stage).ok().and_then(|i| self.stage_blobs[i].as_ref())
    }

    /// Sum of section word counts, flattened across the whole tree
    /// (§8 invariant: `sum(section.word_count) == D.total_words`).
    pub fn total_words(&self) -> usize {
        self.sections.iter().map(|s| s.total_word_count()).sum()
    }

    /// §8 invariant: for a `completed` Document, all stage blobs 1..14 are
    /// non-null, there is >= 1 section, exactly one reference list (trivially
    /// true — `references` is a single Vec), and all quality scores are in
    /// [0,1].
    pub fn validate_completed_invariants(&self) -> Result<()> {
        if !matches!(self.status, GenerationStatus::Completed) {
            return Ok(());
        }
        if self.stage_blobs.iter().any(|b| b.is_none()) {
            return Err(SynthError::SchemaInvariant(
                "completed document missing a stage blob".to_string(),
            ));
        }
        if self.sections.is_empty() {
            return Err(SynthError::SchemaInvariant(
                "completed document has zero sections".to_string(),
            ));
        }
        if !self.quality_scores.all_in_unit_interval() {
            return Err(SynthError::SchemaInvariant(
                "completed document has a quality score outside [0,1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level PDF-derived container (§3 IngestedBook).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: EntityId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// A boundary-aware embedding chunk of a long Chapter (§3 Chapter Invariants:
/// "chunks are ordered, contiguous in character offsets with bounded overlap").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub ordinal: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
    pub preceding_heading: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// A text unit extracted from a Book, or a standalone paper treated as a
/// single chapter (§3 Chapter).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: EntityId,
    pub book_id: Option<EntityId>,
    pub title: String,
    pub page_range: Option<(u32, u32)>,
    pub text: String,
    pub word_count: usize,
    pub embedding: Option<Vec<f32>>,
    pub embedding_model: Option<String>,
    pub is_duplicate: bool,
    pub duplicate_group_id: Option<EntityId>,
    pub preference_score: Option<f64>,
    pub chunks: Option<Vec<Chunk>>,
    pub source_kind: ChapterSourceKind,
    pub quality_score: Option<f32>,
    pub created_at: DateTime<Utc>,
}

/// Distinguishes standalone documents from textbook chapters from papers,
/// used by §4.J's preference-score ordering (standalone > textbook > paper).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChapterSourceKind {
    Standalone,
    Textbook,
    Paper,
}

impl Chapter {
    pub fn new(title: impl Into<String>, text: impl Into<String>, source_kind: ChapterSourceKind) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            id: Uuid::new_v4(),
            book_id: None,
            title: title.into(),
            page_range: None,
            text,
            word_count,
            embedding: None,
            embedding_model: None,
            is_duplicate: false,
            duplicate_group_id: None,
            preference_score: None,
            chunks: None,
            source_kind,
            quality_score: None,
            created_at: now(),
        }
    }

    /// Boundary per §8: word_count == 4000 => no chunks (strictly `>`).
    pub fn needs_chunking(&self) -> bool {
        self.word_count > 4000
    }
}

/// A background-work record (§3 Task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: EntityId,
    pub task_type: String,
    pub status: TaskStatus,
    pub progress_percent: f32,
    pub current_step: Option<String>,
    pub total_steps: Option<u32>,
    pub entity_id: EntityId,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(task_type: impl Into<String>, entity_id: EntityId) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_type: task_type.into(),
            status: TaskStatus::Queued,
            progress_percent: 0.0,
            current_step: None,
            total_steps: None,
            entity_id,
            error: None,
            started_at: None,
            completed_at: None,
            created_at: now(),
        }
    }
}

/// Immutable checkpoint keyed by (document id, stage number) (§3 Checkpoint).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub document_id: EntityId,
    pub stage: u8,
    pub value: StageBlob,
    pub written_at: DateTime<Utc>,
}

/// One issue raised by the Gap Analyzer or other quality checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub severity: Severity,
    pub category: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_word_count_tracks_content() {
        let mut s = Section::new(0, "Intro", SectionType::Introduction);
        s.set_content("one two three");
        assert_eq!(s.word_count, 3);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn section_depth_limit() {
        let mut root = Section::new(0, "root", SectionType::Introduction);
        let mut cur = Section::new(0, "d1", SectionType::Introduction);
        for i in 0..4 {
            let mut child = Section::new(0, format!("d{}", i + 2), SectionType::Introduction);
            child.set_content("x");
            cur.children.push(child);
            cur = cur.children.pop().unwrap();
        }
        // rebuild improperly nested chain to exceed depth via direct construction
        let mut deep = Section::new(0, "a", SectionType::Introduction);
        let mut n = &mut deep;
        for _ in 0..5 {
            n.children.push(Section::new(0, "b", SectionType::Introduction));
            n = n.children.last_mut().unwrap();
        }
        root.children.push(deep);
        assert!(root.validate().is_err());
    }

    #[test]
    fn chapter_chunking_boundary_is_strict() {
        let text = (0..4000).map(|_| "w").collect::<Vec<_>>().join(" ");
        let chapter = Chapter::new("t", text, ChapterSourceKind::Textbook);
        assert_eq!(chapter.word_count, 4000);
        assert!(!chapter.needs_chunking());

        let text2 = (0..4001).map(|_| "w").collect::<Vec<_>>().join(" ");
        let chapter2 = Chapter::new("t", text2, ChapterSourceKind::Textbook);
        assert!(chapter2.needs_chunking());
    }

    #[test]
    fn document_commit_stage_advances_status() {
        let mut doc = Document::new("glioblastoma management", DocumentType::SurgicalDisease);
        doc.commit_stage(1, serde_json::json!({"ok": true})).unwrap();
        assert_eq!(doc.status, GenerationStatus::Stage(2));
        assert!(doc.stage_blob(1).is_some());
    }

    #[test]
    fn document_completed_requires_all_blobs() {
        let mut doc = Document::new("t", DocumentType::PureAnatomy);
        doc.status = GenerationStatus::Completed;
        assert!(doc.validate_completed_invariants().is_err());
        for stage in 1..=14u8 {
            doc.stage_blobs[(stage - 1) as usize] = Some(serde_json::json!(null));
        }
        assert!(doc.validate_completed_invariants().is_err()); // still zero sections
        doc.sections.push(Section::new(0, "s", SectionType::Introduction));
        assert!(doc.validate_completed_invariants().is_ok());
    }
}
