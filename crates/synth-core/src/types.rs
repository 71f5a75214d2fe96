use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque 128-bit identifier shared by every entity in §3.
pub type EntityId = Uuid;

/// Closed set from §6: document_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    SurgicalDisease,
    PureAnatomy,
    SurgicalTechnique,
}

impl DocumentType {
    /// Guidance section-count table used by Stage 1's
    /// `estimated_section_count` and Stage 5's outline guidance. Templates
    /// are guidance, never enforced (§4.H Stage 5).
    pub fn guidance_section_count(&self) -> usize {
        match self {
            DocumentType::SurgicalDisease => 97,
            DocumentType::PureAnatomy => 48,
            DocumentType::SurgicalTechnique => 65,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DocumentType::SurgicalDisease => "surgical_disease",
            DocumentType::PureAnatomy => "pure_anatomy",
            DocumentType::SurgicalTechnique => "surgical_technique",
        };
        write!(f, "{}", s)
    }
}

/// Closed set from §6: section_type (plus the `custom` escape from §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    Introduction,
    Epidemiology,
    Pathophysiology,
    ClinicalPresentation,
    DiagnosticEvaluation,
    DifferentialDiagnosis,
    TreatmentOptions,
    SurgicalTechnique,
    PostoperativeManagement,
    Complications,
    Outcomes,
    FutureDirections,
    Custom(String),
}

/// Closed set from §6: severity. Ordered critical > high > medium > low,
/// matching the ordering guarantee in §5 ("gap-issues by severity").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Closed set from §6: source_type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Internal,
    ExternalDb,
    AiResearch,
}

/// Closed set from §6: task status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

/// Document generation status (§4.8 state machine): stage ordinals 1..=14
/// plus the two terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Stage(u8),
    Completed,
    Failed,
}

impl GenerationStatus {
    pub const FIRST_STAGE: u8 = 1;
    pub const LAST_STAGE: u8 = 14;

    pub fn initial() -> Self {
        GenerationStatus::Stage(Self::FIRST_STAGE)
    }

    /// True if `self` could have been reached by monotonically advancing
    /// from `other` along the stage machine (§3 Invariants).
    pub fn is_monotonic_advance_from(&self, other: &GenerationStatus) -> bool {
        match (other, self) {
            (GenerationStatus::Stage(a), GenerationStatus::Stage(b)) => b >= a,
            (GenerationStatus::Stage(_), GenerationStatus::Completed) => true,
            (GenerationStatus::Stage(_), GenerationStatus::Failed) => true,
            (GenerationStatus::Completed, GenerationStatus::Completed) => true,
            (GenerationStatus::Failed, GenerationStatus::Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStatus::Stage(n) => write!(f, "stage_{}", n),
            GenerationStatus::Completed => write!(f, "completed"),
            GenerationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Closed set from §6: external_research_strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExternalResearchStrategy {
    EvidenceOnly,
    AiOnly,
    Hybrid,
}

/// Closed set from §6: dedup_strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    Exact,
    Fuzzy,
    Semantic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_orders_critical_highest() {
        let mut v = vec![Severity::Low, Severity::Critical, Severity::Medium, Severity::High];
        v.sort();
        assert_eq!(v, vec![Severity::Low, Severity::Medium, Severity::High, Severity::Critical]);
    }

    #[test]
    fn generation_status_monotonic() {
        let s5 = GenerationStatus::Stage(5);
        let s6 = GenerationStatus::Stage(6);
        assert!(s6.is_monotonic_advance_from(&s5));
        assert!(!s5.is_monotonic_advance_from(&s6));
        assert!(GenerationStatus::Completed.is_monotonic_advance_from(&s6));
    }

    #[test]
    fn guidance_section_counts_match_document_types() {
        assert_eq!(DocumentType::SurgicalDisease.guidance_section_count(), 97);
        assert_eq!(DocumentType::PureAnatomy.guidance_section_count(), 48);
        assert_eq!(DocumentType::SurgicalTechnique.guidance_section_count(), 65);
    }
}
