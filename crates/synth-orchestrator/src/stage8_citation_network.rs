//! Stage 8: citation network (§4.H). Flattens internal + external sources
//! into a numbered reference list; each reference retains its `source_type`.

use synth_core::{Reference, Source};

pub fn run(sources: &[Source]) -> (serde_json::Value, Vec<Reference>) {
    let references: Vec<Reference> = sources
        .iter()
        .enumerate()
        .map(|(i, source)| Reference {
            reference_number: (i + 1) as u32,
            source_id: source.id,
            title: source.title.clone(),
            authors: source.authors.clone(),
            year: source.year,
            source_type: source.source_type,
            external_id: source.external_id.clone(),
        })
        .collect();

    let blob = serde_json::json!({ "reference_count": references.len() });
    (blob, references)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SourceType;

    fn source(title: &str, source_type: SourceType) -> Source {
        let mut s = Source::new(title, source_type);
        s.year = Some(2020);
        s
    }

    #[test]
    fn numbers_references_sequentially_and_keeps_source_type() {
        let sources = vec![source("A", SourceType::Internal), source("B", SourceType::ExternalDb)];
        let (_, refs) = run(&sources);
        assert_eq!(refs[0].reference_number, 1);
        assert_eq!(refs[1].reference_number, 2);
        assert_eq!(refs[0].source_type, SourceType::Internal);
        assert_eq!(refs[1].source_type, SourceType::ExternalDb);
    }
}
