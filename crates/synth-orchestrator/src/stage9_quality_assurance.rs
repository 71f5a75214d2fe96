//! Stage 9: quality assurance (§4.H). Four independent [0,1] scores:
//! depth (total words), coverage (section count), evidence (reference
//! count), currency (weighted recency of source years).

use synth_core::{QualityScores, Reference, Section};

/// Flat sum over the top-level section list only; subsections are deliberately
/// not descended into (§9: `coverage_score` rewards shallow breadth, which
/// only holds if depth and coverage both ignore nesting).
fn total_words(sections: &[Section]) -> usize {
    sections.iter().map(|s| s.word_count).sum()
}

fn section_count(sections: &[Section]) -> usize {
    sections.len()
}

/// §4.H Stage 9: "age <= 3 -> 1.0; <= 5 -> 0.8; <= 10 -> 0.5; else -> 0.2".
fn recency_weight(age: i32) -> f32 {
    if age <= 3 {
        1.0
    } else if age <= 5 {
        0.8
    } else if age <= 10 {
        0.5
    } else {
        0.2
    }
}

fn currency_score(references: &[Reference], current_year: i32) -> f32 {
    let weights: Vec<f32> = references.iter().filter_map(|r| r.year).map(|year| recency_weight(current_year - year)).collect();
    if weights.is_empty() {
        return 0.5;
    }
    weights.iter().sum::<f32>() / weights.len() as f32
}

pub fn run(sections: &[Section], references: &[Reference], current_year: i32) -> (serde_json::Value, QualityScores) {
    let depth = (total_words(sections) as f32 / 2000.0).min(1.0);
    let coverage = (section_count(sections) as f32 / 5.0).min(1.0);
    let evidence = (references.len() as f32 / 15.0).min(1.0);
    let currency = currency_score(references, current_year);

    let scores = QualityScores { depth, coverage, currency, evidence };
    let blob = serde_json::to_value(&scores).unwrap_or(serde_json::json!({}));
    (blob, scores)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SectionType;

    #[test]
    fn depth_caps_at_one() {
        let mut s = Section::new(0, "A", SectionType::Introduction);
        s.set_content("word ".repeat(5000));
        let (_, scores) = run(&[s], &[], 2026);
        assert_eq!(scores.depth, 1.0);
    }

    #[test]
    fn currency_defaults_to_half_with_no_years() {
        let (_, scores) = run(&[], &[], 2026);
        assert_eq!(scores.currency, 0.5);
    }
}
