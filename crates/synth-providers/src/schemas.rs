//! Structured-output payload shapes passed to `generate_structured`. Each
//! type derives [`schemars::JsonSchema`] so [`crate::types::StructuredSchema::from_schemars`]
//! can hand a provider a real JSON Schema instead of a hand-maintained one.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Stage 1 (§4.H): topic classification and keyword extraction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChapterAnalysisOutput {
    pub primary_concepts: Vec<String>,
    pub document_type: String,
    pub keywords: Vec<String>,
    pub complexity: String,
    pub estimated_section_count: usize,
    pub confidence: f32,
}

/// A single research gap surfaced during Stage 2 (§4.H, §4.E item 1).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResearchGap {
    pub description: String,
    pub severity: String,
    pub keywords: Vec<String>,
}

/// A candidate reference suggested during Stage 2 context building.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct KeyReference {
    pub title: String,
    pub estimated_relevance: f32,
    pub key_finding: Option<String>,
    pub external_id: Option<String>,
}

/// Expected source-category distribution estimated during Stage 2.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExpectedSourceDistribution {
    pub clinical_studies: u32,
    pub case_reports: u32,
    pub review_articles: u32,
    pub basic_science: u32,
    pub imaging_data: u32,
}

/// Stage 2 output (§4.H): research gaps, key references, expected source
/// distribution, temporal range, and an overall confidence estimate.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ContextBuildingOutput {
    pub research_gaps: Vec<ResearchGap>,
    pub key_references: Vec<KeyReference>,
    pub expected_source_distribution: ExpectedSourceDistribution,
    pub oldest_relevant_year: Option<i32>,
    pub most_recent_year: Option<i32>,
    pub overall_confidence: f32,
}

/// One per-source verdict returned by the Relevance Filter (§4.D).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceRelevanceVerdict {
    pub source_index: usize,
    pub score: f32,
    pub rationale: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceRelevanceOutput {
    pub verdicts: Vec<SourceRelevanceVerdict>,
}

/// A planned (sub)section from Stage 5 (§4.H). Recursive to depth 4 to
/// mirror the Section entity's own tree shape.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedSection {
    pub title: String,
    pub section_type: String,
    pub rationale: String,
    pub key_points: Vec<String>,
    pub estimated_word_count: usize,
    pub source_allocation_hint: Vec<String>,
    pub image_suggestions: Vec<String>,
    #[serde(default)]
    pub subsections: Vec<PlannedSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlanningOutput {
    pub sections: Vec<PlannedSection>,
}

/// A single atomic claim extracted and verified by the Fact Checker (§4.F).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactClaim {
    pub claim_text: String,
    pub category: String,
    pub verified: bool,
    pub confidence: f32,
    pub severity_if_wrong: String,
    pub supporting_source_index: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FactCheckSectionOutput {
    pub claims: Vec<FactClaim>,
}

/// Stage 4.E item 5: bounded list of missing essentials given the document
/// type (3-5 items).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CriticalInformationOutput {
    pub missing_essentials: Vec<String>,
}

/// Stage 12 review (§4.H): contradictions, readability, and sub-scores.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReviewOutput {
    pub contradictions: Vec<String>,
    pub readability_issues: Vec<String>,
    pub missing_transitions: Vec<String>,
    pub citation_issues: Vec<String>,
    pub logical_flow_issues: Vec<String>,
    pub clarity_issues: Vec<String>,
    pub clarity_score: f32,
    pub coherence_score: f32,
    pub consistency_score: f32,
    pub completeness_score: f32,
}
