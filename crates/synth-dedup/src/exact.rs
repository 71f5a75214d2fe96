use crate::merge::merge_into_survivor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use synth_core::Source;

fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Key per §4.C: `hash(normalize(title) || doi || pmid || (authors+year))`.
/// The uniform [`Source`] record carries a single `external_id` standing in
/// for whichever of doi/pmid/url the source has, per §3.
pub fn exact_key(source: &Source) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_title(&source.title).as_bytes());
    hasher.update(source.external_id.clone().unwrap_or_default().as_bytes());
    let authors_year = format!(
        "{}{}",
        source.authors.join(","),
        source.year.map(|y| y.to_string()).unwrap_or_default()
    );
    hasher.update(authors_year.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Exact-hash deduplication (§4.C). Idempotent: running it twice over its
/// own output is a no-op because every surviving key is already unique.
pub fn dedup_exact(sources: Vec<Source>) -> Vec<Source> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut survivors: Vec<Source> = Vec::new();

    for source in sources {
        let key = exact_key(&source);
        match index.get(&key) {
            Some(&pos) => merge_into_survivor(&mut survivors[pos], &source, "exact"),
            None => {
                index.insert(key, survivors.len());
                survivors.push(source);
            }
        }
    }
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SourceType;

    fn source(title: &str, doi: &str, year: i32) -> Source {
        let mut s = Source::new(title, SourceType::ExternalDb);
        s.external_id = Some(doi.to_string());
        s.year = Some(year);
        s
    }

    #[test]
    fn doi_and_normalized_title_match_is_exact_duplicate() {
        let a = source("Management of TBI", "10.1/x", 2023);
        let b = source("management of tbi", "10.1/x", 2023);
        let survivors = dedup_exact(vec![a, b]);
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].duplicate_count, 1);
    }

    #[test]
    fn exact_dedup_is_idempotent() {
        let a = source("Management of TBI", "10.1/x", 2023);
        let b = source("management of tbi", "10.1/x", 2023);
        let once = dedup_exact(vec![a, b]);
        let twice = dedup_exact(once.clone());
        assert_eq!(once.len(), twice.len());
    }

    #[test]
    fn distinct_doi_is_not_merged() {
        let a = source("Management of TBI", "10.1/x", 2023);
        let b = source("Management of TBI", "10.2/y", 2023);
        let survivors = dedup_exact(vec![a, b]);
        assert_eq!(survivors.len(), 2);
    }
}
