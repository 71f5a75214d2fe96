//! Chapter Embedding Pipeline (§4.J): on ingestion, truncates and embeds a
//! Chapter's text, chunks long chapters with overlap for chunk-level
//! embeddings, and scans for existing chapters it duplicates.

pub mod chunking;
pub mod dedup_scan;
pub mod pipeline;
pub mod truncate;

pub use chunking::{chunk_text, RawChunk};
pub use dedup_scan::{preference_score, scan_for_duplicates, ChapterDuplicateUpdate, DuplicateGroupResult};
pub use pipeline::embed_chapter;
pub use truncate::{truncate_for_embedding, EMBEDDING_INPUT_CEILING_CHARS};
