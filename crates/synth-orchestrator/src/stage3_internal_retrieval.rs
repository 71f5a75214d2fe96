//! Stage 3: internal retrieval (§4.H). Parallel internal queries -> dedup
//! -> relevance filter -> rank; also performs the corpus-side half of
//! image-to-topic matching ("matched image references").

use crate::context::OrchestratorContext;
use crate::image_matching::score_image;
use crate::types::{AvailableImage, Stage3Blob};
use synth_core::{EntityId, Result};
use synth_providers::schemas::ChapterAnalysisOutput;

/// Top sources kept after dedup/filter/rank (§4.H Stage 3: "top 20 sources").
const TOP_K: usize = 20;
/// Images attached at the corpus-matching stage before Stage 7 narrows per
/// section; generous so Stage 7 has real candidates to choose from.
const MATCHED_IMAGE_LIMIT: usize = 10;

fn build_queries(topic: &str, stage1: &ChapterAnalysisOutput) -> Vec<String> {
    let mut queries = vec![topic.to_string()];
    queries.extend(stage1.keywords.iter().cloned());
    queries.extend(stage1.primary_concepts.iter().cloned());
    queries.dedup();
    queries
}

fn match_images(keywords: &[String], images: &[AvailableImage]) -> Vec<EntityId> {
    let mut scored: Vec<(f32, EntityId)> = images.iter().map(|img| (score_image(keywords, &img.keywords), img.id)).collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.into_iter().filter(|(score, _)| *score > 0.0).take(MATCHED_IMAGE_LIMIT).map(|(_, id)| id).collect()
}

pub async fn run(
    topic: &str,
    stage1: &ChapterAnalysisOutput,
    ctx: &OrchestratorContext,
) -> Result<(serde_json::Value, Stage3Blob)> {
    let queries = build_queries(topic, stage1);

    let sources = synth_retrieval::internal_retrieval(
        &queries,
        ctx.gateway.clone(),
        ctx.vector_index.clone(),
        ctx.chapters.clone(),
        ctx.lexical_index.clone(),
        ctx.config.internal_query_parallelism,
        TOP_K * 2,
    )
    .await;

    let deduped = synth_dedup::dedup(sources, ctx.config.dedup_strategy.into(), ctx.config.dedup_threshold, &ctx.gateway).await?;

    let filtered = if ctx.config.ai_relevance_filter_enabled {
        synth_relevance::filter_relevant(&ctx.gateway, topic, deduped, ctx.config.ai_relevance_threshold).await?
    } else {
        deduped
    };

    let mut ranked = filtered;
    ranked.sort_by(|a, b| b.best_relevance().partial_cmp(&a.best_relevance()).unwrap());
    ranked.truncate(TOP_K);

    let all_keywords: Vec<String> = stage1.keywords.iter().cloned().chain(stage1.primary_concepts.iter().cloned()).collect();
    let matched_image_ids = match_images(&all_keywords, &ctx.available_images);

    let blob = Stage3Blob { sources: ranked, matched_image_ids };
    let json = serde_json::to_value(&blob).map_err(synth_core::SynthError::from)?;
    Ok((json, blob))
}
