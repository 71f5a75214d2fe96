use once_cell::sync::Lazy;
use regex::Regex;

/// Characters-per-token approximation used throughout this pipeline (no
/// tokenizer dependency is pulled in; §4.J only asks for "~1024 tokens").
const CHARS_PER_TOKEN: usize = 4;
const TARGET_CHUNK_TOKENS: usize = 1024;
const OVERLAP_TOKENS: usize = 128;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+(\s|$)").unwrap());

/// One boundary-aware chunk before embedding: character offsets into the
/// chapter's full text, the chunk's own text, and the nearest heading that
/// preceded it (§3 Chunk, §4.J step iv).
#[derive(Debug, Clone, PartialEq)]
pub struct RawChunk {
    pub start_char: usize,
    pub end_char: usize,
    pub text: String,
    pub preceding_heading: Option<String>,
}

#[derive(Debug, Clone)]
struct Unit {
    start: usize,
    end: usize,
    is_heading: bool,
}

/// A paragraph on its own line, under this length, with no terminal
/// sentence punctuation, reads as a heading rather than body text.
fn looks_like_heading(paragraph: &str) -> bool {
    let trimmed = paragraph.trim();
    !trimmed.is_empty()
        && trimmed.lines().count() == 1
        && trimmed.len() <= 100
        && !trimmed.ends_with(['.', '?', '!'])
}

fn split_paragraphs(text: &str) -> Vec<(usize, usize, &str)> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    for part in text.split("\n\n") {
        let start = cursor;
        let end = start + part.len();
        if !part.trim().is_empty() {
            out.push((start, end, part));
        }
        cursor = (end + 2).min(text.len());
    }
    out
}

fn sentence_spans(paragraph_start: usize, paragraph: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut last_end = 0usize;
    for m in SENTENCE_END.find_iter(paragraph) {
        spans.push((paragraph_start + last_end, paragraph_start + m.end()));
        last_end = m.end();
    }
    if last_end < paragraph.len() {
        spans.push((paragraph_start + last_end, paragraph_start + paragraph.len()));
    }
    spans
}

/// Flattens the chapter text into heading/sentence units, each carrying its
/// own offsets so chunk boundaries always land on a paragraph or sentence
/// edge, never mid-sentence (§3 Chunk invariant: "ordered, contiguous ...
/// with bounded overlap").
fn build_units(text: &str) -> Vec<Unit> {
    let mut units = Vec::new();
    for (start, end, paragraph) in split_paragraphs(text) {
        if looks_like_heading(paragraph) {
            units.push(Unit { start, end, is_heading: true });
        } else {
            for (s, e) in sentence_spans(start, paragraph) {
                if text[s..e].trim().is_empty() {
                    continue;
                }
                units.push(Unit { start: s, end: e, is_heading: false });
            }
        }
    }
    units
}

fn heading_before(text: &str, units: &[Unit], position: usize) -> Option<String> {
    units
        .iter()
        .filter(|u| u.is_heading && u.end <= position)
        .last()
        .map(|u| text[u.start..u.end].trim().to_string())
}

/// Splits `text` into ~1024-token chunks with ~128-token overlap,
/// respecting paragraph and sentence boundaries, each chunk carrying a
/// `preceding_heading` breadcrumb (§4.J step iv). Only called when the
/// owning Chapter's word count exceeds 4000 (§3 Chapter invariant, §8
/// boundary: exactly 4000 words needs no chunks).
pub fn chunk_text(text: &str) -> Vec<RawChunk> {
    let units = build_units(text);
    if units.is_empty() {
        return Vec::new();
    }

    let target_chars = TARGET_CHUNK_TOKENS * CHARS_PER_TOKEN;
    let overlap_chars = OVERLAP_TOKENS * CHARS_PER_TOKEN;

    let mut chunks = Vec::new();
    let mut idx = 0usize;
    while idx < units.len() {
        let chunk_start_unit = idx;
        let start_char = units[chunk_start_unit].start;
        let mut end_unit = chunk_start_unit;

        // Grow the chunk until the next unit would exceed the char budget
        // (always include at least one unit so an oversized single
        // sentence still produces a chunk rather than looping forever).
        while end_unit + 1 < units.len() && units[end_unit + 1].end - start_char <= target_chars {
            end_unit += 1;
        }

        let end_char = units[end_unit].end;
        let preceding_heading = heading_before(text, &units, start_char);
        chunks.push(RawChunk {
            start_char,
            end_char,
            text: text[start_char..end_char].to_string(),
            preceding_heading,
        });

        if end_unit + 1 >= units.len() {
            break;
        }

        // Walk backward from `end_unit` to find where the overlap window
        // begins, so the next chunk repeats the tail of this one instead
        // of starting cold at a hard boundary.
        let mut overlap_unit = end_unit;
        while overlap_unit > chunk_start_unit && end_char - units[overlap_unit].start < overlap_chars {
            overlap_unit -= 1;
        }
        // Forward progress is guaranteed: if the overlap window collapsed
        // back to this chunk's own start unit, advance past it instead.
        idx = if overlap_unit > chunk_start_unit { overlap_unit } else { chunk_start_unit + 1 };
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_paragraph(sentences: usize) -> String {
        (0..sentences).map(|i| format!("This is sentence number {i} in the body.")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("").is_empty());
    }

    #[test]
    fn chunks_are_contiguous_and_overlap() {
        let body = long_paragraph(400);
        let chunks = chunk_text(&body);
        assert!(chunks.len() >= 2, "expected multiple chunks for a long body");
        for pair in chunks.windows(2) {
            assert!(pair[1].start_char <= pair[0].end_char, "chunks should overlap or abut, never gap");
            assert!(pair[1].start_char < pair[0].end_char, "adjacent chunks should share an overlap region");
        }
    }

    #[test]
    fn chunk_never_splits_mid_sentence() {
        let body = long_paragraph(300);
        for chunk in chunk_text(&body) {
            let trimmed = chunk.text.trim();
            assert!(
                trimmed.ends_with('.') || trimmed.ends_with('!') || trimmed.ends_with('?'),
                "chunk should end on a sentence boundary: {trimmed:?}"
            );
        }
    }

    #[test]
    fn heading_breadcrumb_is_carried_into_following_chunks() {
        let text = format!("Overview\n\n{}\n\nComplications\n\n{}", long_paragraph(200), long_paragraph(200));
        let chunks = chunk_text(&text);
        assert!(chunks.iter().any(|c| c.preceding_heading.as_deref() == Some("Overview")));
        assert!(chunks.iter().any(|c| c.preceding_heading.as_deref() == Some("Complications")));
    }
}
