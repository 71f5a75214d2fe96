//! Gap Analyzer, Fact Checker, and the Stage 9 quality-score helpers they
//! share with the orchestrator (§4.E, §4.F, §4.H Stage 9).

pub mod fact_checker;
pub mod gap_analyzer;
pub mod scores;

pub use fact_checker::{check_document, FactCheckResult, SectionClaims};
pub use gap_analyzer::{analyze, GapAnalysisResult};
pub use scores::{compute_quality_scores, coverage_score, currency_score, depth_score, evidence_score};
