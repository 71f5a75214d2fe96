//! Fact Checker (§4.F): per-section claim extraction and verification,
//! aggregated into a document-wide pass/fail verdict.

use synth_core::Section;
use synth_providers::schemas::{FactCheckSectionOutput, FactClaim};
use synth_providers::{GenerationParams, ProviderGateway, StructuredSchema, TaskTag};
use tracing::warn;

/// Aggregated fact-check verdict for one document (§4.F).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FactCheckResult {
    pub claims: Vec<SectionClaims>,
    pub total_claims: usize,
    pub verified_claims: usize,
    pub overall_accuracy: f32,
    pub critical_unverified: usize,
    pub passed: bool,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SectionClaims {
    pub section_title: String,
    pub claims: Vec<FactClaim>,
}

fn build_prompt(section: &Section, sources: &[(usize, String)]) -> String {
    let mut listing = String::new();
    for (index, summary) in sources {
        listing.push_str(&format!("[{index}] {summary}\n"));
    }
    format!(
        "Extract the factual claims in the following section and verify each against the \
         numbered sources below. For every claim report whether it is supported, your \
         confidence, the severity if it turned out to be wrong, and which source index (if any) \
         supports it.\n\nSection: {}\n\n{}\n\nSources:\n{}",
        section.title, section.content, listing
    )
}

/// Runs claim extraction/verification for one section. A provider failure or
/// malformed output is logged and yields zero claims for that section rather
/// than aborting the whole document check (§7: non-fatal per-stage failures
/// degrade gracefully where the contract allows it).
async fn check_section(gateway: &ProviderGateway, section: &Section, sources: &[(usize, String)]) -> SectionClaims {
    let schema = StructuredSchema::from_schemars::<FactCheckSectionOutput>("fact_check_section");
    let prompt = build_prompt(section, sources);
    let params = GenerationParams { task_tag: TaskTag::FactVerification, max_tokens: 2048, ..Default::default() };

    let claims = match gateway.generate_structured(&prompt, &schema, &params).await {
        Ok(generation) => match serde_json::from_value::<FactCheckSectionOutput>(generation.data) {
            Ok(output) => output.claims,
            Err(error) => {
                warn!(%error, section = %section.title, "fact-check output malformed, treating section as unchecked");
                Vec::new()
            }
        },
        Err(error) => {
            warn!(%error, section = %section.title, "fact-check provider call failed, treating section as unchecked");
            Vec::new()
        }
    };

    SectionClaims { section_title: section.title.clone(), claims }
}

/// §8 scenario 6's pass criterion: `accuracy >= 0.90`, or
/// `accuracy >= 0.80 && critical_unverified == 0`; either way capped at
/// `critical_unverified <= 2`.
fn passes(overall_accuracy: f32, critical_unverified: usize) -> bool {
    let accuracy_ok = overall_accuracy >= 0.90 || (overall_accuracy >= 0.80 && critical_unverified == 0);
    accuracy_ok && critical_unverified <= 2
}

/// Checks every leaf section and aggregates into one verdict (§4.F).
/// `sources` is a flat, already-numbered reference listing shared across all
/// sections, mirroring the document's final citation numbering.
pub async fn check_document(
    gateway: &ProviderGateway,
    sections: &[Section],
    sources: &[(usize, String)],
) -> FactCheckResult {
    let mut claims = Vec::with_capacity(sections.len());
    for section in sections {
        claims.push(check_section(gateway, section, sources).await);
    }

    let all_claims: Vec<&FactClaim> = claims.iter().flat_map(|s| s.claims.iter()).collect();
    let total_claims = all_claims.len();
    let verified_claims = all_claims.iter().filter(|c| c.verified).count();
    let overall_accuracy = if total_claims == 0 { 1.0 } else { verified_claims as f32 / total_claims as f32 };
    let critical_unverified = all_claims
        .iter()
        .filter(|c| !c.verified && c.severity_if_wrong.eq_ignore_ascii_case("critical"))
        .count();
    let passed = passes(overall_accuracy, critical_unverified);

    FactCheckResult { claims, total_claims, verified_claims, overall_accuracy, critical_unverified, passed }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claim(verified: bool, severity: &str) -> FactClaim {
        FactClaim {
            claim_text: "claim".to_string(),
            category: "general".to_string(),
            verified,
            confidence: 0.9,
            severity_if_wrong: severity.to_string(),
            supporting_source_index: None,
        }
    }

    /// §8 scenario 6: 10 claims, 8 verified, 2 unverified at medium severity
    /// -> accuracy 0.8, zero critical-unverified, passes.
    #[test]
    fn scenario_6_medium_severity_misses_still_pass() {
        let mut all = Vec::new();
        for _ in 0..8 {
            all.push(claim(true, "low"));
        }
        all.push(claim(false, "medium"));
        all.push(claim(false, "medium"));

        let total = all.len();
        let verified = all.iter().filter(|c| c.verified).count();
        let accuracy = verified as f32 / total as f32;
        let critical_unverified = all.iter().filter(|c| !c.verified && c.severity_if_wrong == "critical").count();

        assert!((accuracy - 0.8).abs() < 1e-6);
        assert_eq!(critical_unverified, 0);
        assert!(passes(accuracy, critical_unverified));
    }

    #[test]
    fn single_critical_unverified_claim_still_fails_below_high_accuracy() {
        assert!(!passes(0.85, 1));
    }

    #[test]
    fn high_accuracy_tolerates_one_critical_miss() {
        assert!(passes(0.95, 1));
    }

    #[test]
    fn three_critical_unverified_always_fails() {
        assert!(!passes(0.99, 3));
    }

    #[test]
    fn empty_claim_set_trivially_passes() {
        assert!(passes(1.0, 0));
    }
}
