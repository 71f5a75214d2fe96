//! Stage 12: review (§4.H). A single structured call over the finished
//! document text that surfaces contradictions, readability issues, missing
//! transitions, citation issues, logical-flow issues, clarity issues, and
//! four quality sub-scores, stored verbatim for downstream consumers.

use crate::context::OrchestratorContext;
use synth_core::{Result, Section, SynthError};
use synth_providers::schemas::ReviewOutput;
use synth_providers::{GenerationParams, StructuredSchema, TaskTag};

fn flatten_text(sections: &[Section], out: &mut String) {
    for section in sections {
        out.push_str(&format!("## {}\n{}\n\n", section.title, section.content));
        flatten_text(&section.children, out);
    }
}

pub async fn run(topic: &str, sections: &[Section], ctx: &OrchestratorContext) -> Result<(serde_json::Value, ReviewOutput)> {
    let mut document_text = String::new();
    flatten_text(sections, &mut document_text);

    let schema = StructuredSchema::from_schemars::<ReviewOutput>("review");
    let prompt = format!(
        "Review the following chapter on \"{}\" as a whole. Identify contradictions, \
         readability issues, missing transitions between sections, citation issues, \
         logical-flow issues, and clarity issues. Also score clarity, coherence, \
         consistency, and completeness, each in [0, 1].\n\n{}",
        topic, document_text
    );
    let params = GenerationParams { task_tag: TaskTag::ContentDrafting, max_tokens: 2048, ..Default::default() };

    let generation = ctx.gateway.generate_structured(&prompt, &schema, &params).await?;
    let output: ReviewOutput = serde_json::from_value(generation.data.clone())
        .map_err(|e| SynthError::ProviderSchemaViolation(format!("review output malformed: {e}")))?;
    Ok((generation.data, output))
}
