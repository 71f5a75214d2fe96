//! Stage 9 quality-score helpers (§4.H Stage 9), shared between
//! `synth-orchestrator` and the Gap Analyzer's own reasoning about balance.

use synth_core::QualityScores;

/// depth = min(1, total_words / 2000).
pub fn depth_score(total_words: usize) -> f32 {
    (total_words as f32 / 2000.0).min(1.0)
}

/// coverage = min(1, section_count / 5).
///
/// §9 Open Questions flags this as plausibly misaligned with the Gap
/// Analyzer's own balance logic (rewards shallow breadth); kept as an
/// independent signal per that note, not reconciled.
pub fn coverage_score(section_count: usize) -> f32 {
    (section_count as f32 / 5.0).min(1.0)
}

/// evidence = min(1, reference_count / 15).
pub fn evidence_score(reference_count: usize) -> f32 {
    (reference_count as f32 / 15.0).min(1.0)
}

/// Weighted recency of source publication years (§4.H Stage 9 currency):
/// age <= 3 -> 1.0, <= 5 -> 0.8, <= 10 -> 0.5, else -> 0.2; averaged across
/// sources with a known year. Defaults to 0.5 when no source carries a year
/// (§8 boundary: "zero sources found ... evidence score = 0" names evidence,
/// not currency; currency's own "no years" default is specified here).
pub fn currency_score(source_years: &[i32], current_year: i32) -> f32 {
    if source_years.is_empty() {
        return 0.5;
    }
    let total: f32 = source_years
        .iter()
        .map(|year| {
            let age = (current_year - year).max(0);
            match age {
                0..=3 => 1.0,
                4..=5 => 0.8,
                6..=10 => 0.5,
                _ => 0.2,
            }
        })
        .sum();
    total / source_years.len() as f32
}

/// Computes all four Stage 9 scores at once.
pub fn compute_quality_scores(
    total_words: usize,
    section_count: usize,
    reference_count: usize,
    source_years: &[i32],
    current_year: i32,
) -> QualityScores {
    QualityScores {
        depth: depth_score(total_words),
        coverage: coverage_score(section_count),
        evidence: evidence_score(reference_count),
        currency: currency_score(source_years, current_year),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_caps_at_one() {
        assert_eq!(depth_score(4000), 1.0);
        assert_eq!(depth_score(1000), 0.5);
    }

    #[test]
    fn evidence_score_zero_with_no_references() {
        assert_eq!(evidence_score(0), 0.0);
    }

    #[test]
    fn currency_defaults_to_half_with_no_years() {
        assert_eq!(currency_score(&[], 2026), 0.5);
    }

    #[test]
    fn currency_rewards_recent_sources() {
        let score = currency_score(&[2025, 2024], 2026);
        assert!((score - 1.0).abs() < 1e-6);
        let stale = currency_score(&[2000, 1995], 2026);
        assert!((stale - 0.2).abs() < 1e-6);
    }
}
