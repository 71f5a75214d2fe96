//! Stage 11: formatting (§4.H). Recursively extract headings (depth-tracked)
//! into a markdown TOC with anchor slugs; validate structure flexibly
//! (empty sections, broken image refs, H1-in-section, nesting > 4 all warn
//! but never block); normalize whitespace, citation spacing, image breaks.

use regex::Regex;
use synth_core::{build_toc, EntityId, Section};

/// §4.H Stage 11: validation is advisory, never blocking.
fn validate(sections: &[Section], depth: usize, valid_image_ids: &[EntityId], warnings: &mut Vec<String>) {
    for section in sections {
        if section.content.trim().is_empty() {
            warnings.push(format!("section \"{}\" has no content", section.title));
        }
        if section.content.contains("\n# ") || section.content.starts_with("# ") {
            warnings.push(format!("section \"{}\" contains an embedded H1 heading", section.title));
        }
        for image in &section.images {
            if !valid_image_ids.is_empty() && !valid_image_ids.contains(&image.image_id) {
                warnings.push(format!("section \"{}\" references an unknown image {}", section.title, image.image_id));
            }
        }
        if depth > 4 {
            warnings.push(format!("section \"{}\" nests deeper than 4 levels", section.title));
        }
        validate(&section.children, depth + 1, valid_image_ids, warnings);
    }
}

fn normalize_whitespace(text: &str) -> String {
    let collapsed = Regex::new(r"[ \t]+").unwrap().replace_all(text, " ");
    let collapsed_blank_lines = Regex::new(r"\n{3,}").unwrap().replace_all(&collapsed, "\n\n");
    collapsed_blank_lines.trim().to_string()
}

fn normalize_citation_spacing(text: &str) -> String {
    // Normalizes "word[3]" / "word [ 3 ]" into "word [3]" ahead of delivery.
    let re = Regex::new(r"\s*\[\s*(\d+)\s*\]").unwrap();
    re.replace_all(text, " [$1]").trim().to_string()
}

fn normalize_section(section: &mut Section) {
    let normalized = normalize_citation_spacing(&normalize_whitespace(&section.content));
    section.set_content(normalized);
    for child in &mut section.children {
        normalize_section(child);
    }
}

pub fn run(sections: &mut [Section], valid_image_ids: &[EntityId]) -> (serde_json::Value, String, Vec<String>) {
    for section in sections.iter_mut() {
        normalize_section(section);
    }

    let mut toc = String::new();
    build_toc(sections, 0, &mut toc);

    let mut warnings = Vec::new();
    validate(sections, 0, valid_image_ids, &mut warnings);

    let blob = serde_json::json!({ "toc_markdown": toc, "warnings": warnings });
    (blob, toc, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SectionType;

    #[test]
    fn toc_nests_subsections() {
        let mut parent = Section::new(0, "Intro", SectionType::Introduction);
        parent.children.push(Section::new(0, "Background", SectionType::Introduction));
        let mut toc = String::new();
        build_toc(&[parent], 0, &mut toc);
        assert!(toc.contains("- [Intro](#intro)"));
        assert!(toc.contains("  - [Background](#background)"));
    }

    #[test]
    fn empty_section_warns_but_does_not_panic() {
        let section = Section::new(0, "Empty", SectionType::Introduction);
        let mut warnings = Vec::new();
        validate(&[section], 0, &[], &mut warnings);
        assert!(warnings.iter().any(|w| w.contains("no content")));
    }
}
