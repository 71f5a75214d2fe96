//! Retrieval Service (§4.B): internal hybrid corpus search and external
//! evidence/AI-grounded tracks, each with per-query caching.

pub mod external;
pub mod internal;

pub use external::{ai_grounded_track, evidence_track, external_retrieval, EvidenceCache, EvidenceCacheEntry};
pub use internal::internal_retrieval;
