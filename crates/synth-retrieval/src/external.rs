//! External retrieval (§4.B): the evidence track (external literature
//! database lookup, cached by (query, M, N) with TTL) and the AI-grounded
//! track (a gateway call with web-grounding, parsed into Sources). Both
//! tracks run in parallel when `external_research_parallel` is set; either
//! may be skipped entirely depending on `external_research_strategy` (§6).

use chrono::Datelike;
use std::sync::Arc;
use std::time::Duration;
use synth_cache::{AiCache, TtlCache};
use synth_core::{EvidenceDatabase, Result, Source, SourceType};
use synth_providers::{GenerationParams, ProviderGateway, TaskTag};
use tracing::warn;

/// Cached unit for the evidence track: the fetched records plus when they
/// were fetched. Caching the whole response (not just the Source
/// conversion) keeps "cache hit is bit-identical to original response"
/// (§4.B) literal.
#[derive(Debug, Clone)]
pub struct EvidenceCacheEntry {
    records: Vec<synth_core::EvidenceRecord>,
}

/// Issues a search against the external literature database, fetches the
/// top `max_results` records, applies the recency filter (last
/// `recency_years` years, when a year is present), and caches the
/// (query, max_results, recency_years) triple. A failed fetch is *not*
/// cached (§9 Open Question: "this spec assumes failures are not cached").
pub async fn evidence_track(
    query: &str,
    evidence_db: &dyn EvidenceDatabase,
    cache: &TtlCache<EvidenceCacheEntry>,
    max_results: usize,
    recency_years: u32,
    ttl: Duration,
) -> Vec<Source> {
    let key = TtlCache::<EvidenceCacheEntry>::evidence_key(query, max_results, recency_years);

    if let Ok(Some(hit)) = cache.get(&key).await {
        return records_to_sources(hit.records);
    }

    let records = match evidence_db.search(query, max_results).await {
        Ok(records) => records,
        Err(error) => {
            warn!(query, %error, "evidence-track search failed, skipping (not cached)");
            return Vec::new();
        }
    };

    let current_year = chrono::Utc::now().year();
    let filtered: Vec<synth_core::EvidenceRecord> = records
        .into_iter()
        .filter(|r| r.year.map(|y| current_year - y <= recency_years as i32).unwrap_or(true))
        .collect();

    let _ = cache.insert(key, EvidenceCacheEntry { records: filtered.clone() }, Some(ttl)).await;
    records_to_sources(filtered)
}

fn records_to_sources(records: Vec<synth_core::EvidenceRecord>) -> Vec<Source> {
    records
        .into_iter()
        .map(|r| {
            let mut source = Source::new(r.title, SourceType::ExternalDb);
            source.authors = r.authors;
            source.year = r.year;
            source.journal = r.journal;
            source.external_id = Some(r.external_id);
            source.abstract_text = r.abstract_text;
            source
        })
        .collect()
}

/// Parses `(title, url)` pairs out of a web-grounded provider answer: a
/// list of markdown-style bullet citations, each `- Title — url` or
/// `Title (url)`; anything that doesn't parse is dropped rather than
/// failing the whole track.
fn parse_grounded_citations(text: &str) -> Vec<(String, Option<String>)> {
    let mut citations = Vec::new();
    for line in text.lines() {
        let line = line.trim().trim_start_matches(['-', '*']).trim();
        if line.is_empty() {
            continue;
        }
        if let Some(open) = line.rfind('(') {
            if let Some(close) = line.rfind(')') {
                if close > open {
                    let title = line[..open].trim().trim_end_matches(['—', '-']).trim();
                    let url = line[open + 1..close].trim();
                    if !title.is_empty() && (url.starts_with("http://") || url.starts_with("https://")) {
                        citations.push((title.to_string(), Some(url.to_string())));
                        continue;
                    }
                }
            }
        }
        if let Some((title, url)) = line.split_once('\u{2014}').or_else(|| line.split_once(" - ")) {
            let url = url.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                citations.push((title.trim().to_string(), Some(url.to_string())));
            }
        }
    }
    citations
}

/// AI-grounded track (§4.B): submits `query` under the `summarization`
/// task tag with grounding framing and parses the referenced sources out
/// of the response text. A provider failure is logged and contributes no
/// sources, matching the evidence track's non-fatal-per-query contract.
pub async fn ai_grounded_track(query: &str, gateway: &ProviderGateway) -> Vec<Source> {
    let prompt = format!(
        "Search the current literature for sources relevant to: \"{query}\". \
         List each source as a bullet line in the form `- Title (https://source-url)`. \
         Do not include commentary, only the bulleted list."
    );
    let params = GenerationParams { task_tag: TaskTag::Summarization, max_tokens: 1024, ..Default::default() };

    let text = match gateway.generate_text(&prompt, &params).await {
        Ok(generation) => generation.text,
        Err(error) => {
            warn!(query, %error, "AI-grounded track failed, contributing no sources");
            return Vec::new();
        }
    };

    parse_grounded_citations(&text)
        .into_iter()
        .map(|(title, url)| {
            let mut source = Source::new(title, SourceType::AiResearch);
            source.external_id = url;
            source
        })
        .collect()
}

/// Runs both tracks per §6's `external_research_strategy` (evidence-only,
/// AI-only, hybrid) and §5/§6's `external_research_parallel` toggle,
/// returning the tagged union. Per-track failure already degrades to an
/// empty Vec inside each track, so the union here never fails.
pub async fn external_retrieval(
    query: &str,
    strategy: synth_core::ExternalResearchStrategy,
    parallel: bool,
    evidence_db: Arc<dyn EvidenceDatabase>,
    cache: Arc<TtlCache<EvidenceCacheEntry>>,
    gateway: Arc<ProviderGateway>,
    max_results: usize,
    recency_years: u32,
    cache_ttl: Duration,
) -> Vec<Source> {
    use synth_core::ExternalResearchStrategy as Strategy;

    let run_evidence = matches!(strategy, Strategy::EvidenceOnly | Strategy::Hybrid);
    let run_ai = matches!(strategy, Strategy::AiOnly | Strategy::Hybrid);

    let (evidence, ai) = if parallel && run_evidence && run_ai {
        let query_a = query.to_string();
        let query_b = query.to_string();
        let evidence_db = evidence_db.clone();
        let cache = cache.clone();
        let gateway = gateway.clone();
        tokio::join!(
            async move { evidence_track(&query_a, evidence_db.as_ref(), cache.as_ref(), max_results, recency_years, cache_ttl).await },
            async move { ai_grounded_track(&query_b, gateway.as_ref()).await },
        )
    } else {
        let evidence = if run_evidence {
            evidence_track(query, evidence_db.as_ref(), cache.as_ref(), max_results, recency_years, cache_ttl).await
        } else {
            Vec::new()
        };
        let ai = if run_ai { ai_grounded_track(query, gateway.as_ref()).await } else { Vec::new() };
        (evidence, ai)
    };

    evidence.into_iter().chain(ai).collect()
}

pub type EvidenceCache = TtlCache<EvidenceCacheEntry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dash_url_bullet() {
        let text = "- Management of TBI (https://pubmed.example/123)\n- Not a url line";
        let parsed = parse_grounded_citations(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].0, "Management of TBI");
        assert_eq!(parsed[0].1.as_deref(), Some("https://pubmed.example/123"));
    }

    #[test]
    fn parses_em_dash_separated_citation() {
        let text = "Endoscopic Pituitary Surgery \u{2014} https://journal.example/987";
        let parsed = parse_grounded_citations(text);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].1.as_deref(), Some("https://journal.example/987"));
    }

    #[tokio::test]
    async fn evidence_track_non_fatal_on_db_error() {
        struct FailingDb;
        #[async_trait::async_trait]
        impl EvidenceDatabase for FailingDb {
            async fn search(&self, _query: &str, _max_results: usize) -> Result<Vec<synth_core::EvidenceRecord>> {
                Err(synth_core::SynthError::ExternalServiceError("down".to_string()))
            }
        }
        let cache = TtlCache::new(Duration::from_secs(60));
        let sources = evidence_track("topic", &FailingDb, &cache, 10, 5, Duration::from_secs(60)).await;
        assert!(sources.is_empty());
    }
}
