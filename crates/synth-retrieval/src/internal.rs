use futures::stream::{self, StreamExt};
use std::sync::Arc;
use synth_core::{Chapter, ChapterStore, LexicalIndex, Source, SourceType, VectorIndex};
use synth_providers::ProviderGateway;
use tracing::{debug, warn};

/// Candidates considered per query before hybrid re-scoring (§4.B: "top K
/// candidates, default 20").
const DEFAULT_ANN_TOP_K: usize = 20;

fn metadata_boost(chapter: &Chapter) -> f32 {
    let non_duplicate = if chapter.is_duplicate { 0.0 } else { 1.0 };
    let quality = chapter.quality_score.unwrap_or(0.5);
    let age_years = chrono::Utc::now().signed_duration_since(chapter.created_at).num_days() as f32 / 365.25;
    let recency = if age_years <= 2.0 { 1.0 } else if age_years <= 5.0 { 0.6 } else { 0.3 };
    (non_duplicate + quality + recency) / 3.0
}

fn chapter_to_source(chapter: &Chapter, cosine: f32, lexical: f32) -> Source {
    let mut source = Source::new(chapter.title.clone(), SourceType::Internal);
    source.lexical_score = Some(lexical);
    let boost = metadata_boost(chapter);
    let hybrid = 0.7 * cosine + 0.2 * lexical + 0.1 * boost;
    source.relevance_score = Some(hybrid.clamp(0.0, 1.0));
    source.abstract_text = Some(chapter.text.chars().take(500).collect());
    source.embedding = chapter.embedding.clone();
    source
}

/// Runs one query end to end: embed, ANN search, hybrid re-score.
async fn retrieve_for_query(
    query: &str,
    gateway: &ProviderGateway,
    vector_index: &dyn VectorIndex,
    chapter_store: &dyn ChapterStore,
    lexical_index: &dyn LexicalIndex,
    top_k: usize,
) -> synth_core::Result<Vec<Source>> {
    let embedding = gateway
        .generate_embedding(query)
        .await
        .map(|g| g.vector)
        .unwrap_or_default();
    if embedding.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = vector_index.search(&embedding, DEFAULT_ANN_TOP_K).await?;
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let Some(chapter) = chapter_store.get_chapter(candidate.chapter_id).await? else {
            continue;
        };
        let lexical = lexical_index.overlap_score(query, chapter.id).await.unwrap_or(0.0);
        scored.push(chapter_to_source(&chapter, candidate.cosine_similarity, lexical));
    }

    scored.sort_by(|a, b| b.best_relevance().partial_cmp(&a.best_relevance()).unwrap());
    scored.truncate(top_k);
    Ok(scored)
}

/// Internal retrieval (§4.B): runs `queries` with bounded concurrency
/// `parallelism`, merges all per-query results, and returns the combined,
/// re-ranked top `top_k` sources. A per-query failure is logged and
/// contributes no sources rather than aborting the batch.
pub async fn internal_retrieval(
    queries: &[String],
    gateway: Arc<ProviderGateway>,
    vector_index: Arc<dyn VectorIndex>,
    chapter_store: Arc<dyn ChapterStore>,
    lexical_index: Arc<dyn LexicalIndex>,
    parallelism: usize,
    top_k: usize,
) -> Vec<Source> {
    let results: Vec<Vec<Source>> = stream::iter(queries.iter().cloned())
        .map(|query| {
            let gateway = gateway.clone();
            let vector_index = vector_index.clone();
            let chapter_store = chapter_store.clone();
            let lexical_index = lexical_index.clone();
            async move {
                match retrieve_for_query(&query, &gateway, vector_index.as_ref(), chapter_store.as_ref(), lexical_index.as_ref(), top_k).await {
                    Ok(sources) => sources,
                    Err(error) => {
                        warn!(query, %error, "internal retrieval query failed, skipping");
                        Vec::new()
                    }
                }
            }
        })
        .buffer_unordered(parallelism.max(1))
        .collect()
        .await;

    let mut merged: Vec<Source> = results.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.best_relevance().partial_cmp(&a.best_relevance()).unwrap());
    debug!(count = merged.len(), "internal retrieval merged candidates");
    merged.truncate(top_k);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::ChapterSourceKind;

    #[test]
    fn metadata_boost_rewards_non_duplicate_recent_high_quality() {
        let mut good = Chapter::new("t", "x", ChapterSourceKind::Standalone);
        good.quality_score = Some(1.0);
        let mut stale_duplicate = good.clone();
        stale_duplicate.is_duplicate = true;
        stale_duplicate.quality_score = Some(0.1);
        stale_duplicate.created_at = chrono::Utc::now() - chrono::Duration::days(365 * 20);

        assert!(metadata_boost(&good) > metadata_boost(&stale_duplicate));
    }
}
