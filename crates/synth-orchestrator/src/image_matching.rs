//! Keyword-overlap image scoring shared by Stage 3 (corpus-wide matching)
//! and Stage 7 (per-section attachment) (§4.H).

use crate::types::AvailableImage;
use std::collections::HashSet;
use synth_core::SectionType;

fn token_set(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

/// Jaccard-style overlap between a set of reference keywords and an
/// image's own keyword tags.
pub fn score_image(reference_keywords: &[String], image_keywords: &[String]) -> f32 {
    let reference = token_set(reference_keywords);
    let image = token_set(image_keywords);
    if reference.is_empty() || image.is_empty() {
        return 0.0;
    }
    let hits = image.iter().filter(|kw| reference.contains(*kw)).count() as f32;
    hits / image.len() as f32
}

/// §4.H Stage 7: "score available images by keyword overlap with title +
/// first 200 content words, plus a section-type bonus". The bonus rewards
/// image-heavy section types (anatomy/technique content leans on figures).
pub fn section_type_bonus(section_type: &SectionType) -> f32 {
    match section_type {
        SectionType::SurgicalTechnique => 0.2,
        SectionType::DiagnosticEvaluation => 0.15,
        SectionType::Pathophysiology => 0.1,
        _ => 0.0,
    }
}

/// Keywords drawn from a section's title plus the first 200 words of its
/// content, the text window Stage 7 scores images against.
pub fn section_keyword_window(title: &str, content: &str) -> Vec<String> {
    let mut words: Vec<String> = title.split_whitespace().map(|w| w.to_lowercase()).collect();
    words.extend(content.split_whitespace().take(200).map(|w| w.to_lowercase()));
    words
}

pub fn score_for_section(image: &AvailableImage, title: &str, content: &str, section_type: &SectionType) -> f32 {
    let window = section_keyword_window(title, content);
    score_image(&window, &image.keywords) + section_type_bonus(section_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_rewards_shared_keywords() {
        let a = score_image(&["glioma".to_string(), "resection".to_string()], &["glioma".to_string()]);
        let b = score_image(&["glioma".to_string()], &["unrelated".to_string()]);
        assert!(a > b);
    }

    #[test]
    fn section_type_bonus_favors_technique_sections() {
        assert!(section_type_bonus(&SectionType::SurgicalTechnique) > section_type_bonus(&SectionType::Introduction));
    }
}
