//! Markdown rendering and TOC extraction shared between Stage 11
//! (`synth-orchestrator`) and `render_markdown` below, so the round-trip law
//! in §8 ("markdown export -> parse -> extract headings -> TOC is
//! structurally equal to Stage 11's TOC") compares two outputs built from
//! the same `slugify`/`build_toc` rather than two independent ones.

use crate::entities::{Document, Section};

pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    let mut prev_dash = false;
    for ch in title.to_lowercase().chars() {
        if ch.is_alphanumeric() {
            slug.push(ch);
            prev_dash = false;
        } else if !prev_dash {
            slug.push('-');
            prev_dash = true;
        }
    }
    slug.trim_matches('-').to_string()
}

/// Recursively emits one indented bullet per section: `- [title](#slug)`.
pub fn build_toc(sections: &[Section], depth: usize, out: &mut String) {
    for section in sections {
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{}- [{}](#{})\n", indent, section.title, slugify(&section.title)));
        build_toc(&section.children, depth + 1, out);
    }
}

const TOC_HEADING: &str = "Table of Contents";

fn render_section(section: &Section, depth: usize, out: &mut String) {
    let level = "#".repeat((depth + 2).min(6));
    out.push_str(&format!("{} {}\n\n", level, section.title));
    if !section.content.trim().is_empty() {
        out.push_str(section.content.trim());
        out.push_str("\n\n");
    }
    for child in &section.children {
        render_section(child, depth + 1, out);
    }
}

/// Pure rendering of a Document to a single markdown string: a top-level
/// heading for the topic, a Table of Contents section built with
/// [`build_toc`], and each Section's already-markdown `content` under a
/// heading nested to match its depth. Does not read storage; callers own
/// deciding when a Document is `completed` enough to export (§6
/// `GET /documents/{id}/markdown`).
pub fn render_markdown(document: &Document) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {}\n\n", document.topic));

    out.push_str(&format!("## {TOC_HEADING}\n\n"));
    let mut toc = String::new();
    build_toc(&document.sections, 0, &mut toc);
    out.push_str(&toc);
    out.push('\n');

    for section in &document.sections {
        render_section(section, 0, &mut out);
    }

    out.trim_end().to_string()
    // note: trailing newline intentionally dropped; writers add their own.
}

/// Parses the heading lines `render_markdown` produced (levels 3..=6, i.e.
/// every section heading but the document title and the "Table of
/// Contents" heading itself) back into the same bullet-list shape
/// [`build_toc`] produces directly from the Section tree, for the §8
/// round-trip law.
pub fn extract_heading_toc(markdown: &str) -> String {
    let mut out = String::new();
    for line in markdown.lines() {
        let trimmed = line.trim_end();
        let level = trimmed.chars().take_while(|c| *c == '#').count();
        if level < 2 || !trimmed.starts_with(&"#".repeat(level)) {
            continue;
        }
        let rest = trimmed[level..].trim();
        if level == 1 || rest == TOC_HEADING {
            continue;
        }
        let depth = level - 2;
        let indent = "  ".repeat(depth);
        out.push_str(&format!("{}- [{}](#{})\n", indent, rest, slugify(rest)));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentType, SectionType};

    #[test]
    fn slugify_strips_punctuation_and_lowercases() {
        assert_eq!(slugify("Clinical Presentation & Diagnosis"), "clinical-presentation-diagnosis");
    }

    #[test]
    fn render_then_extract_round_trips_to_the_same_toc() {
        let mut doc = Document::new("glioblastoma management", DocumentType::SurgicalDisease);
        let mut intro = Section::new(0, "Introduction", SectionType::Introduction);
        intro.set_content("Glioblastoma is an aggressive primary brain tumor.");
        let mut background = Section::new(0, "Background", SectionType::Custom("background".to_string()));
        background.set_content("Historical context on treatment approaches.");
        intro.children.push(background);
        let mut outcomes = Section::new(1, "Outcomes", SectionType::Outcomes);
        outcomes.set_content("Five-year survival remains poor without resection.");
        doc.sections = vec![intro, outcomes];

        let rendered = render_markdown(&doc);
        let extracted = extract_heading_toc(&rendered);

        let mut direct = String::new();
        build_toc(&doc.sections, 0, &mut direct);

        assert_eq!(extracted, direct);
    }

    #[test]
    fn render_includes_section_content_and_topic_title() {
        let mut doc = Document::new("pituitary adenoma", DocumentType::SurgicalDisease);
        let mut section = Section::new(0, "Epidemiology", SectionType::Epidemiology);
        section.set_content("Incidence is roughly 1 in 1000.");
        doc.sections = vec![section];

        let rendered = render_markdown(&doc);
        assert!(rendered.starts_with("# pituitary adenoma"));
        assert!(rendered.contains("## Table of Contents"));
        assert!(rendered.contains("### Epidemiology"));
        assert!(rendered.contains("Incidence is roughly 1 in 1000."));
    }
}
