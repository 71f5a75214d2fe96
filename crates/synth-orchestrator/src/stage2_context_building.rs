//! Stage 2: context building (§4.H). Structured call producing research
//! gaps, key references, expected source distribution, temporal range, and
//! an overall confidence estimate.

use crate::context::OrchestratorContext;
use synth_core::{Document, Result, SynthError};
use synth_providers::schemas::{ChapterAnalysisOutput, ContextBuildingOutput};
use synth_providers::{GenerationParams, StructuredSchema, TaskTag};

pub async fn run(
    doc: &Document,
    stage1: &ChapterAnalysisOutput,
    ctx: &OrchestratorContext,
) -> Result<(serde_json::Value, ContextBuildingOutput)> {
    let schema = StructuredSchema::from_schemars::<ContextBuildingOutput>("context_building");
    let prompt = format!(
        "Topic: \"{}\" ({})\nPrimary concepts: {}\nKeywords: {}\n\n\
         Identify research gaps a chapter on this topic should address (each with a \
         severity and the keywords that would signal it has been covered), propose key \
         references worth seeking out, estimate the distribution of source categories a \
         balanced chapter would draw on, estimate the relevant publication-year range, \
         and give an overall confidence for this assessment.",
        doc.topic,
        doc.document_type,
        stage1.primary_concepts.join(", "),
        stage1.keywords.join(", "),
    );
    let params = GenerationParams { task_tag: TaskTag::MetadataExtraction, max_tokens: 1536, ..Default::default() };

    let generation = ctx.gateway.generate_structured(&prompt, &schema, &params).await?;
    let output: ContextBuildingOutput = serde_json::from_value(generation.data.clone()).map_err(|e| {
        SynthError::ProviderSchemaViolation(format!("context_building output malformed: {e}"))
    })?;
    Ok((generation.data, output))
}
