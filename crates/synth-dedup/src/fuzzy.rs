use crate::merge::merge_into_survivor;
use std::collections::HashSet;
use synth_core::Source;

fn author_set(authors: &[String]) -> HashSet<String> {
    authors.iter().map(|a| a.to_lowercase()).collect()
}

fn year_proximity(a: Option<i32>, b: Option<i32>) -> f32 {
    match (a, b) {
        (Some(y1), Some(y2)) => match (y1 - y2).abs() {
            0..=1 => 1.0,
            2 => 0.5,
            _ => 0.0,
        },
        _ => 0.0,
    }
}

/// Weighted fuzzy similarity (§4.C): `0.6 * title_similarity + 0.3 *
/// author_jaccard + 0.1 * year_proximity`. When neither source carries an
/// author list, the author term has no evidence to contribute either way
/// and is dropped from the sum rather than scored as a mismatch; the
/// remaining weights are renormalized over the terms that are actually
/// present, matching the original's `if authors1 and authors2: score +=
/// ...` skip rather than substituting a zero.
pub fn fuzzy_similarity(a: &Source, b: &Source) -> f32 {
    let title_sim = strsim::normalized_levenshtein(&a.title.to_lowercase(), &b.title.to_lowercase()) as f32;

    let set_a = author_set(&a.authors);
    let set_b = author_set(&b.authors);
    let both_missing_authors = set_a.is_empty() && set_b.is_empty();
    let jaccard = if set_a.is_empty() || set_b.is_empty() {
        0.0
    } else {
        let intersection = set_a.intersection(&set_b).count() as f32;
        let union = set_a.union(&set_b).count() as f32;
        if union == 0.0 { 0.0 } else { intersection / union }
    };

    let year_prox = year_proximity(a.year, b.year);

    if both_missing_authors {
        (0.6 * title_sim + 0.1 * year_prox) / 0.7
    } else {
        0.6 * title_sim + 0.3 * jaccard + 0.1 * year_prox
    }
}

/// Fuzzy deduplication (§4.C): first-seen survivor, pairwise comparison
/// against sources already kept. At `threshold = 1.0` this requires a
/// perfect (case-insensitive) title match, an identical author set, and a
/// publication-year difference of at most one — in practice collapsing to
/// near-exact matching (§8 boundary: "dedup threshold 1.0 => fuzzy reduces
/// to exact").
pub fn dedup_fuzzy(sources: Vec<Source>, threshold: f32) -> Vec<Source> {
    let mut survivors: Vec<Source> = Vec::new();

    'outer: for source in sources {
        for survivor in survivors.iter_mut() {
            if fuzzy_similarity(survivor, &source) >= threshold {
                merge_into_survivor(survivor, &source, "fuzzy");
                continue 'outer;
            }
        }
        survivors.push(source);
    }
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SourceType;

    fn source(title: &str, authors: &[&str], year: i32) -> Source {
        let mut s = Source::new(title, SourceType::ExternalDb);
        s.authors = authors.iter().map(|a| a.to_string()).collect();
        s.year = Some(year);
        s
    }

    #[test]
    fn similar_titles_with_shared_authors_are_duplicates() {
        let a = source("Management of Severe Traumatic Brain Injury", &["Smith", "Jones"], 2023);
        let b = source("Management of Severe Traumatic Brain Injuries", &["Smith", "Jones"], 2023);
        assert!(fuzzy_similarity(&a, &b) >= 0.85);
        let survivors = dedup_fuzzy(vec![a, b], 0.85);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn missing_authors_on_both_sides_falls_back_to_title_and_year() {
        let a = source("Management of TBI", &[], 2023);
        let b = source("management of tbi", &[], 2023);
        assert_eq!(fuzzy_similarity(&a, &b), 1.0);
        let survivors = dedup_fuzzy(vec![a, b], 0.85);
        assert_eq!(survivors.len(), 1);
    }

    #[test]
    fn dissimilar_sources_are_not_merged() {
        let a = source("Management of Traumatic Brain Injury", &["Smith"], 2023);
        let b = source("Endoscopic Pituitary Surgery Outcomes", &["Lee"], 2019);
        let survivors = dedup_fuzzy(vec![a, b], 0.85);
        assert_eq!(survivors.len(), 2);
    }

    #[test]
    fn threshold_one_requires_near_identical_fields() {
        let a = source("Management of TBI", &["Smith"], 2023);
        let b = source("Management of TBI", &["Smith"], 2023);
        let c = source("Management of TBI", &["Smith"], 2021);
        assert_eq!(dedup_fuzzy(vec![a.clone(), b], 1.0).len(), 1);
        assert_eq!(dedup_fuzzy(vec![a, c], 1.0).len(), 2);
    }

    #[test]
    fn fuzzy_dedup_is_convergent() {
        let a = source("Management of Traumatic Brain Injury", &["Smith", "Jones"], 2023);
        let b = source("Management of TBI", &["Smith", "Jones"], 2023);
        let c = source("Severe TBI Outcomes in Adults", &["Lee"], 2020);
        let first_pass = dedup_fuzzy(vec![a, b, c], 0.85);
        let second_pass = dedup_fuzzy(first_pass.clone(), 0.85);
        assert!(second_pass.len() <= first_pass.len());
    }
}
