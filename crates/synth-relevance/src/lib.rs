//! Relevance Filter (§4.D): submits a batch of candidate sources to the
//! Provider Gateway under the `source_relevance` task tag and keeps only
//! those scoring at or above a threshold, preserving input order.

use synth_core::{Result, Source, SynthError};
use synth_providers::schemas::{SourceRelevanceOutput, SourceRelevanceVerdict};
use synth_providers::{GenerationParams, ProviderGateway, StructuredSchema, TaskTag};
use tracing::{debug, warn};

/// Sources are judged in chunks of this size per provider call so a single
/// prompt never grows unbounded with a large candidate set.
const DEFAULT_BATCH_SIZE: usize = 20;

fn build_prompt(query: &str, batch: &[&Source]) -> String {
    let mut prompt = format!(
        "Query: \"{query}\"\n\nFor each numbered source below, assign a relevance score in [0,1] \
         and a one-sentence rationale for how well it supports research on the query.\n\n"
    );
    for (i, source) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. {} ({}) — {}\n",
            i,
            source.title,
            source.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string()),
            source.abstract_text.as_deref().unwrap_or("no abstract available")
        ));
    }
    prompt
}

/// Scores `sources` against `query` and keeps those with score >= threshold.
/// Input ordering is preserved in the output (§4.D, §5 ordering guarantees).
pub async fn filter_relevant(
    gateway: &ProviderGateway,
    query: &str,
    mut sources: Vec<Source>,
    threshold: f32,
) -> Result<Vec<Source>> {
    if sources.is_empty() {
        return Ok(sources);
    }

    let schema = StructuredSchema::from_schemars::<SourceRelevanceOutput>("source_relevance");
    let params = GenerationParams { task_tag: TaskTag::SourceRelevance, max_tokens: 2048, ..Default::default() };

    let mut verdicts: Vec<Option<SourceRelevanceVerdict>> = vec![None; sources.len()];
    for (batch_start, batch) in sources.iter().collect::<Vec<_>>().chunks(DEFAULT_BATCH_SIZE).enumerate() {
        let offset = batch_start * DEFAULT_BATCH_SIZE;
        let prompt = build_prompt(query, batch);
        let generation = gateway.generate_structured(&prompt, &schema, &params).await?;
        let output: SourceRelevanceOutput = serde_json::from_value(generation.data).map_err(|e| {
            SynthError::ProviderSchemaViolation(format!("source_relevance output malformed: {e}"))
        })?;
        for verdict in output.verdicts {
            let absolute_index = offset + verdict.source_index;
            if let Some(slot) = verdicts.get_mut(absolute_index) {
                *slot = Some(verdict);
            } else {
                warn!(index = absolute_index, "relevance verdict referenced an out-of-range source");
            }
        }
    }

    let mut kept = Vec::with_capacity(sources.len());
    for (source, verdict) in sources.drain(..).zip(verdicts) {
        let mut source = source;
        match verdict {
            Some(v) if v.score >= threshold => {
                source.relevance_score = Some(v.score);
                kept.push(source);
            }
            Some(v) => debug!(title = %source.title, score = v.score, "source dropped below relevance threshold"),
            None => debug!(title = %source.title, "source received no relevance verdict, dropping"),
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SourceType;

    #[test]
    fn prompt_lists_sources_in_order_with_stable_indices() {
        let a = Source::new("A", SourceType::Internal);
        let b = Source::new("B", SourceType::Internal);
        let refs = vec![&a, &b];
        let prompt = build_prompt("topic", &refs);
        let idx_a = prompt.find("0. A").unwrap();
        let idx_b = prompt.find("1. B").unwrap();
        assert!(idx_a < idx_b);
    }
}
