//! Deduplication Engine (§4.C): exact/fuzzy/semantic strategies over
//! [`synth_core::Source`] records, sharing one merge policy. Used for both
//! the stage-3/4 source dedup (default threshold 0.85) and, via
//! [`synth_ingest`], the distinct chapter-level dedup (threshold 0.95) the
//! Open Question in §9 keeps separate from this one.

pub mod exact;
pub mod fuzzy;
pub mod merge;
pub mod semantic;

pub use exact::{dedup_exact, exact_key};
pub use fuzzy::{dedup_fuzzy, fuzzy_similarity};
pub use merge::merge_into_survivor;
pub use semantic::dedup_semantic;

use synth_core::{DedupStrategy, Result, Source};
use synth_providers::ProviderGateway;

/// Dispatches to the configured strategy (§6 Configuration: `dedup_strategy`).
pub async fn dedup(
    sources: Vec<Source>,
    strategy: DedupStrategy,
    threshold: f32,
    gateway: &ProviderGateway,
) -> Result<Vec<Source>> {
    match strategy {
        DedupStrategy::Exact => Ok(dedup_exact(sources)),
        DedupStrategy::Fuzzy => Ok(dedup_fuzzy(sources, threshold)),
        DedupStrategy::Semantic => dedup_semantic(sources, gateway, threshold).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::{SourceType, SynthesisConfig};
    use synth_providers::RoutingTable;

    fn source(title: &str, doi: &str, authors: &[&str], year: i32) -> Source {
        let mut s = Source::new(title, SourceType::ExternalDb);
        s.external_id = if doi.is_empty() { None } else { Some(doi.to_string()) };
        s.authors = authors.iter().map(|a| a.to_string()).collect();
        s.year = Some(year);
        s
    }

    /// §8 scenario 2, literal fixture: (a)/(b) share a doi and collapse to
    /// one normalized title once the author term stops being scored as a
    /// mismatch when both sides simply have no author data; (c) carries no
    /// doi and a title too dissimilar from (a)/(b) under the 0.6-weighted
    /// title term to clear 0.85 on its own, so it survives as a second,
    /// distinct source.
    #[tokio::test]
    async fn scenario_2_dedup_preserves_metadata() {
        let a = source("Management of TBI", "10.1/x", &[], 2023);
        let b = source("management of tbi", "10.1/x", &[], 2023);
        let c = source("Management of Traumatic Brain Injury", "", &["Smith", "Jones"], 2023);

        let gateway = ProviderGateway::new(&SynthesisConfig::default(), RoutingTable::new());
        let survivors = dedup(vec![a, b, c], DedupStrategy::Fuzzy, 0.85, &gateway).await.unwrap();

        assert_eq!(survivors.len(), 2);
        let ab_survivor = survivors.iter().find(|s| s.external_id.as_deref() == Some("10.1/x")).unwrap();
        assert_eq!(ab_survivor.duplicate_count, 1);
        assert!(ab_survivor.alternative_titles.contains(&"management of tbi".to_string()));
        let c_survivor = survivors.iter().find(|s| s.duplicate_count == 0).unwrap();
        assert_eq!(c_survivor.title, "Management of Traumatic Brain Injury");
    }

    #[tokio::test]
    async fn semantic_strategy_uses_precomputed_embeddings_without_provider_calls() {
        let mut a = source("Management of TBI", "", &[], 2023);
        a.embedding = Some(vec![1.0, 0.0, 0.0]);
        let mut b = source("Management of Traumatic Brain Injury", "", &[], 2023);
        b.embedding = Some(vec![0.99, 0.01, 0.0]);

        let gateway = ProviderGateway::new(&SynthesisConfig::default(), RoutingTable::new());
        let survivors = dedup(vec![a, b], DedupStrategy::Semantic, 0.9, &gateway).await.unwrap();
        assert_eq!(survivors.len(), 1);
    }
}
