use synth_core::{Chapter, ChapterSourceKind, EntityId, Result, VectorIndex};
use tracing::info;
use uuid::Uuid;

/// One Chapter's resolved position within a duplicate group, ready for the
/// caller to persist via `ChapterStore::update_chapter` (§4.J step v).
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterDuplicateUpdate {
    pub chapter_id: EntityId,
    pub is_duplicate: bool,
    pub duplicate_group_id: EntityId,
    pub preference_score: f64,
}

/// The outcome of a duplicate scan: a shared group id and every member's
/// resolved `is_duplicate`/`preference_score` (§8 invariant: "exactly one
/// Chapter per `duplicate_group_id` has `is_duplicate=false`").
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateGroupResult {
    pub group_id: EntityId,
    pub updates: Vec<ChapterDuplicateUpdate>,
}

fn source_kind_weight(kind: ChapterSourceKind) -> f64 {
    // §4.J: "standalone > textbook > paper" preference ordering.
    match kind {
        ChapterSourceKind::Standalone => 3.0,
        ChapterSourceKind::Textbook => 2.0,
        ChapterSourceKind::Paper => 1.0,
    }
}

fn recency_weight(created_at: chrono::DateTime<chrono::Utc>) -> f64 {
    let age_days = (chrono::Utc::now() - created_at).num_days().max(0) as f64;
    1.0 / (1.0 + age_days / 365.0)
}

/// Computes the unbounded positive preference score used to break ties
/// within a duplicate group (§3 Chapter, GLOSSARY "Preference score"):
/// weighted sum of source-type preference, word count, quality, recency,
/// and how confidently this chapter was matched into the group.
pub fn preference_score(chapter: &Chapter, detection_confidence: f32) -> f64 {
    10.0 * source_kind_weight(chapter.source_kind)
        + chapter.word_count as f64 * 0.001
        + 5.0 * chapter.quality_score.unwrap_or(0.5) as f64
        + 2.0 * recency_weight(chapter.created_at)
        + 3.0 * detection_confidence as f64
}

/// Scans for existing Chapters whose embedding has cosine similarity above
/// `threshold` (default 0.95 — distinct from the Source-level dedup
/// threshold of 0.85 per the Open Question in §9) against `new_chapter`,
/// and resolves the resulting group: highest preference score wins
/// (`is_duplicate=false`), everyone else in the group is flagged pointing
/// at the shared `duplicate_group_id`.
///
/// Returns `None` when `new_chapter` has no embedding yet, or when no
/// existing chapter clears the similarity threshold.
pub async fn scan_for_duplicates(
    new_chapter: &Chapter,
    existing_chapters: &[Chapter],
    vector_index: &dyn VectorIndex,
    threshold: f32,
) -> Result<Option<DuplicateGroupResult>> {
    let Some(embedding) = &new_chapter.embedding else {
        return Ok(None);
    };

    let search_width = (existing_chapters.len() + 1).max(1);
    let candidates = vector_index.search(embedding, search_width).await?;

    let mut matched: Vec<(&Chapter, f32)> = candidates
        .into_iter()
        .filter(|c| c.chapter_id != new_chapter.id && c.cosine_similarity > threshold)
        .filter_map(|c| existing_chapters.iter().find(|ch| ch.id == c.chapter_id).map(|ch| (ch, c.cosine_similarity)))
        .collect();

    if matched.is_empty() {
        return Ok(None);
    }
    matched.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let group_id = matched
        .iter()
        .filter_map(|(c, _)| c.duplicate_group_id)
        .next()
        .unwrap_or_else(Uuid::new_v4);

    let mut scored: Vec<(EntityId, chrono::DateTime<chrono::Utc>, f64)> = Vec::with_capacity(matched.len() + 1);
    scored.push((new_chapter.id, new_chapter.created_at, preference_score(new_chapter, 1.0)));
    for (chapter, similarity) in &matched {
        scored.push((chapter.id, chapter.created_at, preference_score(chapter, *similarity)));
    }

    // Highest score wins; ties broken by earliest ingestion, then by id for
    // full determinism.
    let winner = scored
        .iter()
        .cloned()
        .max_by(|a, b| {
            a.2.partial_cmp(&b.2)
                .unwrap()
                .then_with(|| b.1.cmp(&a.1))
                .then_with(|| b.0.cmp(&a.0))
        })
        .map(|(id, _, _)| id)
        .expect("scored is non-empty");

    info!(%group_id, winner = %winner, members = scored.len(), "resolved chapter duplicate group");

    let updates = scored
        .into_iter()
        .map(|(chapter_id, _, preference_score)| ChapterDuplicateUpdate {
            chapter_id,
            is_duplicate: chapter_id != winner,
            duplicate_group_id: group_id,
            preference_score,
        })
        .collect();

    Ok(Some(DuplicateGroupResult { group_id, updates }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use synth_core::memory::InMemoryVectorIndex;

    fn chapter(kind: ChapterSourceKind, words: usize) -> Chapter {
        let text = (0..words).map(|_| "w").collect::<Vec<_>>().join(" ");
        let mut c = Chapter::new("t", text, kind);
        c.embedding = Some(vec![1.0, 0.0, 0.0]);
        c
    }

    #[tokio::test]
    async fn no_embedding_means_no_scan() {
        let mut new_chapter = chapter(ChapterSourceKind::Standalone, 100);
        new_chapter.embedding = None;
        let index = InMemoryVectorIndex::default();
        let result = scan_for_duplicates(&new_chapter, &[], &index, 0.95).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn standalone_outranks_textbook_and_paper_at_equal_similarity() {
        let index = InMemoryVectorIndex::default();
        let standalone = chapter(ChapterSourceKind::Standalone, 1000);
        let textbook = chapter(ChapterSourceKind::Textbook, 1000);
        let paper = chapter(ChapterSourceKind::Paper, 1000);

        index.upsert(textbook.id, textbook.embedding.clone().unwrap()).await.unwrap();
        index.upsert(paper.id, paper.embedding.clone().unwrap()).await.unwrap();

        let existing = vec![textbook.clone(), paper.clone()];
        let result = scan_for_duplicates(&standalone, &existing, &index, 0.5).await.unwrap().unwrap();

        assert_eq!(result.updates.len(), 3);
        let winner = result.updates.iter().find(|u| !u.is_duplicate).unwrap();
        assert_eq!(winner.chapter_id, standalone.id);
        assert_eq!(result.updates.iter().filter(|u| u.is_duplicate).count(), 2);
    }

    #[tokio::test]
    async fn dissimilar_chapters_are_not_grouped() {
        let index = InMemoryVectorIndex::default();
        let mut new_chapter = chapter(ChapterSourceKind::Standalone, 500);
        new_chapter.embedding = Some(vec![1.0, 0.0, 0.0]);
        let mut other = chapter(ChapterSourceKind::Textbook, 500);
        other.embedding = Some(vec![0.0, 1.0, 0.0]);
        index.upsert(other.id, other.embedding.clone().unwrap()).await.unwrap();

        let result = scan_for_duplicates(&new_chapter, &[other], &index, 0.95).await.unwrap();
        assert!(result.is_none());
    }
}
