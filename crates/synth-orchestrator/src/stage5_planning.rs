//! Stage 5: planning (§4.H). Structured call producing the outline: a
//! recursive list of sections (depth <= 4) with rationale, key points,
//! estimated word count, source allocation hints, and image suggestions.
//! Document-type section-count guidance is advisory only, never enforced.

use crate::context::OrchestratorContext;
use synth_core::{Document, Result, SynthError};
use synth_providers::schemas::{ContextBuildingOutput, PlanningOutput};
use synth_providers::{GenerationParams, StructuredSchema, TaskTag};

pub async fn run(
    doc: &Document,
    stage2: &ContextBuildingOutput,
    ctx: &OrchestratorContext,
) -> Result<(serde_json::Value, PlanningOutput)> {
    let schema = StructuredSchema::from_schemars::<PlanningOutput>("planning");
    let guidance_count = doc.document_type.guidance_section_count();
    let gaps: Vec<&str> = stage2.research_gaps.iter().map(|g| g.description.as_str()).collect();

    let prompt = format!(
        "Plan the outline for a {} chapter on \"{}\". A typical chapter of this type runs \
         roughly {} sections as guidance, not a hard requirement. Address these research \
         gaps where relevant: {}. For every section, give a title, a section type, a short \
         rationale, a list of key points to cover, an estimated word count, which source \
         categories it should draw on, image suggestions, and, where it would clarify a \
         complex topic, nested subsections (up to 4 levels deep).",
        doc.document_type,
        doc.topic,
        guidance_count,
        gaps.join("; "),
    );
    let params = GenerationParams { task_tag: TaskTag::ContentDrafting, max_tokens: 4096, ..Default::default() };

    let generation = ctx.gateway.generate_structured(&prompt, &schema, &params).await?;
    let output: PlanningOutput = serde_json::from_value(generation.data.clone()).map_err(|e| {
        SynthError::ProviderSchemaViolation(format!("planning output malformed: {e}"))
    })?;
    Ok((generation.data, output))
}
