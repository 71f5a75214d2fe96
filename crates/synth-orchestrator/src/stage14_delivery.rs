//! Stage 14: delivery (§4.H). Marks the document `completed` and returns the
//! terminal checkpoint blob; the orchestrator driver emits the matching
//! `completed` progress event after this stage commits.

use synth_core::Document;

pub fn run(doc: &Document) -> serde_json::Value {
    serde_json::json!({
        "document_id": doc.id,
        "status": "completed",
    })
}
