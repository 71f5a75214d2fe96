use synth_core::Source;

/// Merges a detected duplicate into its survivor (§4.C Merge policy): append
/// the duplicate's title to `alternative_titles`, fill empty identifier
/// fields from the duplicate, keep the longer abstract, bump
/// `duplicate_count`, and record which strategy caught it.
pub fn merge_into_survivor(survivor: &mut Source, duplicate: &Source, strategy_label: &str) {
    if duplicate.title != survivor.title && !survivor.alternative_titles.contains(&duplicate.title) {
        survivor.alternative_titles.push(duplicate.title.clone());
    }

    if survivor.external_id.is_none() {
        survivor.external_id = duplicate.external_id.clone();
    }
    if survivor.journal.is_none() {
        survivor.journal = duplicate.journal.clone();
    }
    if survivor.year.is_none() {
        survivor.year = duplicate.year;
    }

    let survivor_len = survivor.abstract_text.as_ref().map(|s| s.len()).unwrap_or(0);
    let duplicate_len = duplicate.abstract_text.as_ref().map(|s| s.len()).unwrap_or(0);
    if duplicate_len > survivor_len {
        survivor.abstract_text = duplicate.abstract_text.clone();
    }

    survivor.duplicate_count += 1;
    survivor.dedup_strategy_label = Some(strategy_label.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::SourceType;

    #[test]
    fn merge_keeps_longer_abstract_and_records_alternative_title() {
        let mut survivor = Source::new("Management of TBI", SourceType::ExternalDb);
        survivor.abstract_text = Some("short".to_string());
        let mut duplicate = Source::new("Management of Traumatic Brain Injury", SourceType::ExternalDb);
        duplicate.abstract_text = Some("a much longer abstract body".to_string());

        merge_into_survivor(&mut survivor, &duplicate, "fuzzy");

        assert_eq!(survivor.alternative_titles, vec!["Management of Traumatic Brain Injury".to_string()]);
        assert_eq!(survivor.abstract_text.as_deref(), Some("a much longer abstract body"));
        assert_eq!(survivor.duplicate_count, 1);
        assert_eq!(survivor.dedup_strategy_label.as_deref(), Some("fuzzy"));
    }
}
