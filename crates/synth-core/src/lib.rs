//! Shared domain types, configuration, and capability traits for the
//! synthesis workspace. Every other crate depends on `synth-core`; it
//! depends on nothing else in the workspace.

pub mod config;
pub mod entities;
pub mod error;
pub mod markdown;
pub mod memory;
pub mod traits;
pub mod types;

pub use config::{CircuitBreakerConfig, ModelRates, ProviderTuning, SynthesisConfig};
pub use entities::{
    Book, Chapter, ChapterSourceKind, Checkpoint, Chunk, Document, ImagePlacement, Issue, Reference,
    QualityScores, Section, Source, StageBlob, Task,
};
pub use error::{Result, SynthError};
pub use markdown::{build_toc, extract_heading_toc, render_markdown, slugify};
pub use traits::{
    AnnCandidate, ChapterStore, CheckpointStore, DocumentStore, EvidenceDatabase, EvidenceRecord,
    LexicalIndex, TaskStore, VectorIndex,
};
pub use types::{
    DedupStrategy, DocumentType, EntityId, ExternalResearchStrategy, GenerationStatus, SectionType,
    Severity, SourceType, TaskStatus,
};
