//! Stage 10: fact checking (§4.H). Invokes the Fact Checker (§4.F) and
//! persists its verdict and breakdown verbatim.

use crate::context::OrchestratorContext;
use synth_core::{Reference, Section};
use synth_quality::fact_checker::{self, FactCheckResult};

fn flatten_leaves<'a>(sections: &'a [Section], out: &mut Vec<&'a Section>) {
    for section in sections {
        if section.children.is_empty() {
            out.push(section);
        } else {
            flatten_leaves(&section.children, out);
        }
    }
}

pub async fn run(sections: &[Section], references: &[Reference], ctx: &OrchestratorContext) -> (serde_json::Value, FactCheckResult) {
    let mut leaves = Vec::new();
    flatten_leaves(sections, &mut leaves);
    let leaves: Vec<Section> = leaves.into_iter().cloned().collect();

    let sources: Vec<(usize, String)> =
        references.iter().map(|r| (r.reference_number as usize, format!("{} ({})", r.title, r.year.map(|y| y.to_string()).unwrap_or_default()))).collect();

    let result = fact_checker::check_document(&ctx.gateway, &leaves, &sources).await;
    let blob = serde_json::to_value(&result).unwrap_or(serde_json::json!({}));
    (blob, result)
}
