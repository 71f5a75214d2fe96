//! Stage 4: external retrieval (§4.H). Parallel evidence + AI-grounded
//! tracks per query -> union, tagged by `source_type` -> dedup -> relevance
//! filter -> top 15.

use crate::context::OrchestratorContext;
use crate::types::Stage4Blob;
use futures::stream::{self, StreamExt};
use synth_core::{Result, SourceType};
use synth_providers::schemas::ChapterAnalysisOutput;

/// §4.H Stage 4: "Output top 15".
const TOP_K: usize = 15;
/// §4.B evidence track: "fetch structured records for the top M PMIDs".
const EVIDENCE_MAX_RESULTS: usize = 10;
/// §4.B evidence track: "recency filter (last N years)".
const EVIDENCE_RECENCY_YEARS: u32 = 15;
/// Bound the number of distinct queries fanned out to external services;
/// unlike Stage 3's internal ANN search, each external query is a real
/// network round trip against a rate-limited service.
const MAX_EXTERNAL_QUERIES: usize = 4;

fn build_queries(topic: &str, stage1: &ChapterAnalysisOutput) -> Vec<String> {
    let mut queries = vec![topic.to_string()];
    queries.extend(stage1.primary_concepts.iter().cloned());
    queries.dedup();
    queries.truncate(MAX_EXTERNAL_QUERIES);
    queries
}

pub async fn run(
    topic: &str,
    stage1: &ChapterAnalysisOutput,
    ctx: &OrchestratorContext,
) -> Result<(serde_json::Value, Stage4Blob)> {
    let queries = build_queries(topic, stage1);
    let parallel = ctx.config.external_research_parallel;
    let strategy = ctx.config.external_research_strategy.into();
    let cache_ttl = std::time::Duration::from_secs(ctx.config.cache_ttl_secs);

    let per_query: Vec<Vec<synth_core::Source>> = stream::iter(queries.into_iter())
        .map(|query| {
            let evidence_db = ctx.evidence_db.clone();
            let cache = ctx.evidence_cache.clone();
            let gateway = ctx.gateway.clone();
            async move {
                synth_retrieval::external_retrieval(
                    &query,
                    strategy,
                    parallel,
                    evidence_db,
                    cache,
                    gateway,
                    EVIDENCE_MAX_RESULTS,
                    EVIDENCE_RECENCY_YEARS,
                    cache_ttl,
                )
                .await
            }
        })
        .buffer_unordered(ctx.config.internal_query_parallelism.max(1))
        .collect()
        .await;

    let union: Vec<synth_core::Source> = per_query.into_iter().flatten().collect();
    let evidence_subset_count = union.iter().filter(|s| s.source_type == SourceType::ExternalDb).count();
    let ai_subset_count = union.iter().filter(|s| s.source_type == SourceType::AiResearch).count();

    let deduped = synth_dedup::dedup(union, ctx.config.dedup_strategy.into(), ctx.config.dedup_threshold, &ctx.gateway).await?;
    let filtered = if ctx.config.ai_relevance_filter_enabled {
        synth_relevance::filter_relevant(&ctx.gateway, topic, deduped, ctx.config.ai_relevance_threshold).await?
    } else {
        deduped
    };

    let mut ranked = filtered;
    ranked.sort_by(|a, b| b.best_relevance().partial_cmp(&a.best_relevance()).unwrap());
    ranked.truncate(TOP_K);

    let blob = Stage4Blob { sources: ranked, evidence_subset_count, ai_subset_count };
    let json = serde_json::to_value(&blob).map_err(synth_core::SynthError::from)?;
    Ok((json, blob))
}
