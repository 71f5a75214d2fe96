//! Stage 13: finalization (§4.H). Sets `version=1.0`, `is_current_version`,
//! and the document totals persisted in the checkpoint blob.

use synth_core::Document;

pub fn run(doc: &mut Document) -> serde_json::Value {
    doc.version = "1.0".to_string();
    doc.is_current_version = true;

    serde_json::json!({
        "version": doc.version,
        "total_words": doc.total_words(),
        "section_count": doc.sections.len(),
        "reference_count": doc.references.len(),
    })
}
