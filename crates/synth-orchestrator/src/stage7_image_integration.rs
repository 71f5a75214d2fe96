//! Stage 7: image integration (§4.H). For each section and subsection,
//! score available images by keyword overlap with title + first 200 content
//! words plus a section-type bonus, attach the top-K that haven't already
//! been used (section: 3, subsection: 2), and caption them via the gateway.

use crate::context::OrchestratorContext;
use crate::image_matching::score_for_section;
use crate::types::AvailableImage;
use std::collections::HashSet;
use synth_core::{EntityId, ImagePlacement, Section};
use synth_providers::{GenerationParams, TaskTag};

/// §4.H Stage 7: "attach top-K (section: 3, subsection: 2)".
const TOP_K_SECTION: usize = 3;
const TOP_K_SUBSECTION: usize = 2;

async fn caption_for(ctx: &OrchestratorContext, image: &AvailableImage, section_title: &str) -> String {
    let hint = image.caption_hint.clone().unwrap_or_default();
    let prompt = format!(
        "Write a one-sentence figure caption for an image used in the \"{}\" section. \
         Image keywords: {}. Existing hint: {}.",
        section_title,
        image.keywords.join(", "),
        hint,
    );
    let params = GenerationParams { task_tag: TaskTag::ContentDrafting, max_tokens: 128, ..Default::default() };
    match ctx.gateway.generate_text(&prompt, &params).await {
        Ok(generation) => generation.text.trim().to_string(),
        Err(_) => hint,
    }
}

async fn integrate_section(section: &mut Section, depth: usize, images: &[AvailableImage], used: &mut HashSet<EntityId>, ctx: &OrchestratorContext) {
    let top_k = if depth == 0 { TOP_K_SECTION } else { TOP_K_SUBSECTION };

    let mut scored: Vec<(f32, &AvailableImage)> = images
        .iter()
        .filter(|img| !used.contains(&img.id))
        .map(|img| (score_for_section(img, &section.title, &section.content, &section.section_type), img))
        .filter(|(score, _)| *score > 0.0)
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.truncate(top_k);

    for (score, image) in scored {
        let caption = caption_for(ctx, image, &section.title).await;
        section.images.push(ImagePlacement { image_id: image.id, caption, relevance_score: score });
        used.insert(image.id);
    }

    for child in &mut section.children {
        Box::pin(integrate_section(child, depth + 1, images, used, ctx)).await;
    }
}

pub async fn run(sections: &mut [Section], ctx: &OrchestratorContext) -> synth_core::Result<serde_json::Value> {
    let mut used: HashSet<EntityId> = HashSet::new();
    for section in sections.iter_mut() {
        integrate_section(section, 0, &ctx.available_images, &mut used, ctx).await;
    }

    let total_placements: usize = sections.iter().map(count_images).sum();
    let blob = serde_json::json!({ "images_placed": total_placements, "distinct_images_used": used.len() });
    Ok(blob)
}

fn count_images(section: &Section) -> usize {
    section.images.len() + section.children.iter().map(count_images).sum::<usize>()
}
