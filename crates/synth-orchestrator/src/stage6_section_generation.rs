//! Stage 6: section generation (§4.H). Each planned section selects its
//! relevant sources (keyword-and-hint weighted top-K), generates content,
//! then recursively generates subsections sequentially (they share parent
//! context). Top-level sections run with bounded concurrency. A per-section
//! failure produces a placeholder and does not abort the pipeline.

use crate::context::OrchestratorContext;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use synth_core::{DocumentType, Section, SectionType, Source};
use synth_providers::schemas::PlannedSection;
use synth_providers::{GenerationParams, TaskTag};

/// §4.H Stage 6: "bounded concurrency, default batch size 5" is the config
/// default (`section_generation_batch_size`); this is only the floor used
/// when a caller somehow configures 0.
const MIN_BATCH_SIZE: usize = 1;
/// Sources allocated per section before generation.
const SOURCES_PER_SECTION: usize = 5;

fn parse_section_type(raw: &str) -> SectionType {
    match raw.to_lowercase().replace(' ', "_").as_str() {
        "introduction" => SectionType::Introduction,
        "epidemiology" => SectionType::Epidemiology,
        "pathophysiology" => SectionType::Pathophysiology,
        "clinical_presentation" => SectionType::ClinicalPresentation,
        "diagnostic_evaluation" => SectionType::DiagnosticEvaluation,
        "differential_diagnosis" => SectionType::DifferentialDiagnosis,
        "treatment_options" => SectionType::TreatmentOptions,
        "surgical_technique" => SectionType::SurgicalTechnique,
        "postoperative_management" => SectionType::PostoperativeManagement,
        "complications" => SectionType::Complications,
        "outcomes" => SectionType::Outcomes,
        "future_directions" => SectionType::FutureDirections,
        other => SectionType::Custom(other.to_string()),
    }
}

fn keyword_set(words: &[String]) -> HashSet<String> {
    words.iter().flat_map(|w| w.split_whitespace()).map(|w| w.to_lowercase()).collect()
}

/// §4.H Stage 6: "select its relevant sources (keyword-and-hint weighted
/// top-K)". Scores each candidate by the overlap between the section's key
/// points + source allocation hints and the source's title + abstract.
fn allocate_sources<'a>(planned: &PlannedSection, sources: &'a [Source]) -> Vec<&'a Source> {
    let wanted: HashSet<String> =
        keyword_set(&planned.key_points).into_iter().chain(keyword_set(&planned.source_allocation_hint)).collect();
    if wanted.is_empty() || sources.is_empty() {
        return sources.iter().take(SOURCES_PER_SECTION).collect();
    }

    let mut scored: Vec<(f32, &Source)> = sources
        .iter()
        .map(|source| {
            let haystack = format!("{} {}", source.title, source.abstract_text.as_deref().unwrap_or(""));
            let haystack_words = keyword_set(&haystack.split_whitespace().map(String::from).collect::<Vec<_>>());
            let hits = wanted.intersection(&haystack_words).count() as f32;
            (hits + source.best_relevance(), source)
        })
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    scored.into_iter().take(SOURCES_PER_SECTION).map(|(_, s)| s).collect()
}

fn build_prompt(topic: &str, document_type: DocumentType, parent_title: Option<&str>, planned: &PlannedSection, allocated: &[&Source]) -> String {
    let mut listing = String::new();
    for source in allocated {
        listing.push_str(&format!("- {} ({})\n", source.title, source.year.map(|y| y.to_string()).unwrap_or_else(|| "n.d.".to_string())));
    }
    let parent_note = parent_title.map(|t| format!("This is a subsection of \"{t}\". ")).unwrap_or_default();
    format!(
        "Write the \"{}\" section of a {} chapter on \"{}\". {}Rationale: {}. Key points to \
         cover: {}. Target roughly {} words. Ground claims in these sources where relevant:\n{}",
        planned.title,
        document_type,
        topic,
        parent_note,
        planned.rationale,
        planned.key_points.join("; "),
        planned.estimated_word_count,
        listing,
    )
}

/// Recursive async fn, boxed because Rust doesn't allow naive recursion in
/// `async fn` (§4.H: subsections "generated sequentially within a section
/// because subsections share parent context").
fn generate_section_tree<'a>(
    topic: &'a str,
    document_type: DocumentType,
    parent_title: Option<&'a str>,
    planned: &'a PlannedSection,
    ordinal: usize,
    all_sources: &'a [Source],
    ctx: &'a OrchestratorContext,
) -> Pin<Box<dyn Future<Output = Section> + Send + 'a>> {
    Box::pin(async move {
        let section_type = parse_section_type(&planned.section_type);
        let mut section = Section::new(ordinal, planned.title.clone(), section_type);

        let allocated = allocate_sources(planned, all_sources);
        section.source_ids = allocated.iter().map(|s| s.id).collect();

        let prompt = build_prompt(topic, document_type, parent_title, planned, &allocated);
        let params = GenerationParams { task_tag: TaskTag::ContentDrafting, max_tokens: 2048, ..Default::default() };

        match ctx.gateway.generate_text(&prompt, &params).await {
            Ok(generation) => section.set_content(generation.text),
            Err(error) => {
                // §8 boundary: a placeholder is still generated (word_count
                // may be low but nonzero) and Stage 6 does not fail.
                section.set_content(format!(
                    "Content generation for this section failed and requires manual review. ({error})"
                ));
                section.generation_error = Some(error.to_string());
            }
        }

        for (i, sub) in planned.subsections.iter().enumerate() {
            let child = generate_section_tree(topic, document_type, Some(planned.title.as_str()), sub, i, all_sources, ctx).await;
            section.children.push(child);
        }

        section
    })
}

/// Per-section failure summary persisted in the stage blob (§4.H: a
/// placeholder's error is "recorded", not silently dropped).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Stage6Blob {
    pub section_count: usize,
    pub failed_ordinals: Vec<usize>,
}

pub async fn run(
    topic: &str,
    document_type: DocumentType,
    planned: &[PlannedSection],
    all_sources: &[Source],
    ctx: &OrchestratorContext,
) -> synth_core::Result<(serde_json::Value, Vec<Section>)> {
    let batch_size = if ctx.config.parallel_section_generation {
        ctx.config.section_generation_batch_size.max(MIN_BATCH_SIZE)
    } else {
        MIN_BATCH_SIZE
    };

    let indexed: Vec<(usize, &PlannedSection)> = planned.iter().enumerate().collect();
    let mut generated: Vec<(usize, Section)> = stream::iter(indexed)
        .map(|(ordinal, planned)| async move {
            let section = generate_section_tree(topic, document_type, None, planned, ordinal, all_sources, ctx).await;
            (ordinal, section)
        })
        .buffer_unordered(batch_size)
        .collect()
        .await;

    // §5 ordering guarantee: "the stage's final output orders sections by
    // their planned ordinal", independent of fan-out completion order.
    generated.sort_by_key(|(ordinal, _)| *ordinal);
    let sections: Vec<Section> = generated.into_iter().map(|(_, s)| s).collect();

    let failed_ordinals: Vec<usize> = sections.iter().filter(|s| s.generation_error.is_some()).map(|s| s.ordinal).collect();
    let blob = Stage6Blob { section_count: sections.len(), failed_ordinals };
    let json = serde_json::to_value(&blob).map_err(synth_core::SynthError::from)?;
    Ok((json, sections))
}
