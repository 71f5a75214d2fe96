//! Synthesis Orchestrator state machine (§4.H). Dispatches stages 1-14 in
//! strict sequence, persisting a checkpoint and emitting a `progress` event
//! after each successful stage; resumes from `last_committed_stage + 1` on
//! restart instead of re-running completed stages.

use crate::context::OrchestratorContext;
use crate::types::{Stage3Blob, Stage4Blob, Stage5Blob, WorkingState};
use crate::{
    stage1_input_validation, stage10_fact_checking, stage11_formatting, stage12_review,
    stage13_finalization, stage14_delivery, stage2_context_building, stage3_internal_retrieval,
    stage4_external_retrieval, stage5_planning, stage6_section_generation, stage7_image_integration,
    stage8_citation_network, stage9_quality_assurance,
};
use synth_core::{Checkpoint, Document, EntityId, GenerationStatus, Result, Severity, SynthError};
use synth_events::{document_topic, Event};
use synth_quality::gap_analyzer;
use tracing::{error, info, warn};

pub struct SynthesisOrchestrator {
    ctx: OrchestratorContext,
}

impl SynthesisOrchestrator {
    pub fn new(ctx: OrchestratorContext) -> Self {
        Self { ctx }
    }

    /// Rebuilds in-process stage context from persisted blobs so a resumed
    /// run does not re-invoke stages 1..N-1 (§4.H, §8 scenario 5).
    pub fn reconstruct_working_state(&self, doc: &Document) -> Result<WorkingState> {
        let mut state = WorkingState::default();
        if let Some(blob) = doc.stage_blob(1) {
            state.stage1 = Some(serde_json::from_value(blob.clone())?);
        }
        if let Some(blob) = doc.stage_blob(2) {
            state.stage2 = Some(serde_json::from_value(blob.clone())?);
        }
        if let Some(blob) = doc.stage_blob(3) {
            let parsed: Stage3Blob = serde_json::from_value(blob.clone())?;
            state.internal_sources = parsed.sources;
            state.matched_image_ids = parsed.matched_image_ids;
        }
        if let Some(blob) = doc.stage_blob(4) {
            let parsed: Stage4Blob = serde_json::from_value(blob.clone())?;
            state.external_sources = parsed.sources;
        }
        if let Some(blob) = doc.stage_blob(5) {
            let parsed: Stage5Blob = serde_json::from_value(blob.clone())?;
            state.planned_sections = parsed.sections;
        }
        Ok(state)
    }

    /// Runs a Document through every remaining stage, starting at
    /// `document.status`'s stage (or from scratch for a brand-new
    /// `stage_1` document). Returns the terminal Document on success.
    pub async fn run(&self, document_id: EntityId) -> Result<Document> {
        let mut doc = self
            .ctx
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| SynthError::UnknownEntity(document_id.to_string()))?;

        if matches!(doc.status, GenerationStatus::Completed) {
            return Ok(doc);
        }

        let start_stage = match doc.status {
            GenerationStatus::Stage(n) => n,
            GenerationStatus::Failed => {
                return Err(SynthError::SchemaInvariant(
                    "a failed document requires an operator-initiated resume_from_stage call".to_string(),
                ))
            }
            GenerationStatus::Completed => unreachable!("handled above"),
        };

        let mut state = self.reconstruct_working_state(&doc)?;
        self.run_from(&mut doc, &mut state, start_stage).await?;
        Ok(doc)
    }

    /// Operator-initiated resume of a `failed` document at an explicit
    /// stage (§7: "the persisted checkpoint enables an operator-initiated
    /// resume").
    pub async fn resume_from_stage(&self, document_id: EntityId, stage: u8) -> Result<Document> {
        let mut doc = self
            .ctx
            .documents
            .get(document_id)
            .await?
            .ok_or_else(|| SynthError::UnknownEntity(document_id.to_string()))?;
        let mut state = self.reconstruct_working_state(&doc)?;
        doc.status = GenerationStatus::Stage(stage);
        self.run_from(&mut doc, &mut state, stage).await?;
        Ok(doc)
    }

    async fn run_from(&self, doc: &mut Document, state: &mut WorkingState, start_stage: u8) -> Result<()> {
        let topic = document_topic(doc.id);

        for stage in start_stage..=GenerationStatus::LAST_STAGE {
            let outcome = self.run_stage(stage, doc, state).await;
            let blob = match outcome {
                Ok((blob, halt_reason)) => {
                    doc.commit_stage(stage, blob.clone())?;
                    self.ctx
                        .checkpoints
                        .write(Checkpoint { document_id: doc.id, stage, value: blob.clone(), written_at: chrono::Utc::now() })
                        .await?;
                    self.ctx.documents.update(doc.clone()).await?;
                    self.ctx.publisher.publish(
                        &topic,
                        Event::progress(stage, stage as u32, GenerationStatus::LAST_STAGE as u32, format!("stage {stage} complete"), blob.clone()),
                    );

                    if let Some(reason) = halt_reason {
                        doc.mark_failed(stage, reason.clone());
                        self.ctx.documents.update(doc.clone()).await?;
                        self.ctx.publisher.publish(&topic, Event::failed(SynthError::SchemaInvariant(reason.clone()).kind_label(), reason.clone()));
                        return Err(SynthError::SchemaInvariant(reason));
                    }
                    blob
                }
                Err(error) => {
                    error!(stage, %error, document_id = %doc.id, "stage failed, transitioning document to failed");
                    doc.mark_failed(stage, error.to_string());
                    self.ctx.documents.update(doc.clone()).await?;
                    self.ctx.publisher.publish(&topic, Event::failed(error.kind_label(), error.to_string()));
                    return Err(error);
                }
            };
            let _ = blob;
        }

        self.ctx.publisher.publish(
            &topic,
            Event::completed(serde_json::json!({
                "document_id": doc.id,
                "total_words": doc.total_words(),
                "section_count": doc.sections.len(),
            })),
        );
        info!(document_id = %doc.id, "synthesis completed");
        Ok(())
    }

    /// Dispatches one stage, returning its persisted blob and, for stage 6
    /// only, an optional halt reason when `halt_on_critical_gaps` fires.
    async fn run_stage(&self, stage: u8, doc: &mut Document, state: &mut WorkingState) -> Result<(serde_json::Value, Option<String>)> {
        match stage {
            1 => {
                let (blob, output) = stage1_input_validation::run(doc, &self.ctx).await?;
                state.stage1 = Some(output);
                Ok((blob, None))
            }
            2 => {
                let stage1 = self.require_stage1(state)?;
                let (blob, output) = stage2_context_building::run(doc, stage1, &self.ctx).await?;
                state.stage2 = Some(output);
                Ok((blob, None))
            }
            3 => {
                let stage1 = self.require_stage1(state)?;
                let (blob, output) = stage3_internal_retrieval::run(&doc.topic, stage1, &self.ctx).await?;
                state.internal_sources = output.sources;
                state.matched_image_ids = output.matched_image_ids;
                Ok((blob, None))
            }
            4 => {
                let stage1 = self.require_stage1(state)?;
                let (blob, output) = stage4_external_retrieval::run(&doc.topic, stage1, &self.ctx).await?;
                state.external_sources = output.sources;
                Ok((blob, None))
            }
            5 => {
                let stage2 = self.require_stage2(state)?;
                let (blob, output) = stage5_planning::run(doc, stage2, &self.ctx).await?;
                state.planned_sections = output.sections;
                Ok((blob, None))
            }
            6 => {
                let all_sources = state.all_sources();
                let (blob, sections) = stage6_section_generation::run(&doc.topic, doc.document_type, &state.planned_sections, &all_sources, &self.ctx).await?;
                doc.sections = sections;

                let halt_reason = if self.ctx.config.auto_gap_analysis_enabled {
                    let research_gaps = self.require_stage2(state)?.research_gaps.clone();
                    let gap_result = gap_analyzer::analyze(&self.ctx.gateway, doc.document_type, &doc.topic, &doc.sections, &all_sources, &research_gaps).await;
                    let has_critical = gap_result.issues.iter().any(|issue| issue.severity == Severity::Critical);
                    doc.gap_analysis = Some(serde_json::to_value(&gap_result)?);

                    if self.ctx.config.halt_on_critical_gaps && has_critical {
                        Some("critical gap(s) detected by the gap analyzer; halting per halt_on_critical_gaps".to_string())
                    } else {
                        None
                    }
                } else {
                    None
                };
                Ok((blob, halt_reason))
            }
            7 => {
                let blob = stage7_image_integration::run(&mut doc.sections, &self.ctx).await?;
                Ok((blob, None))
            }
            8 => {
                let (blob, references) = stage8_citation_network::run(&state.all_sources());
                doc.references = references;
                Ok((blob, None))
            }
            9 => {
                use chrono::Datelike;
                let current_year = chrono::Utc::now().year();
                let (blob, scores) = stage9_quality_assurance::run(&doc.sections, &doc.references, current_year);
                doc.quality_scores = scores;
                Ok((blob, None))
            }
            10 => {
                let (blob, result) = stage10_fact_checking::run(&doc.sections, &doc.references, &self.ctx).await;
                doc.fact_check = Some(serde_json::to_value(&result)?);
                Ok((blob, None))
            }
            11 => {
                let (blob, _toc, warnings) = stage11_formatting::run(&mut doc.sections, &state.matched_image_ids);
                if !warnings.is_empty() {
                    warn!(document_id = %doc.id, count = warnings.len(), "stage 11 structural warnings (non-blocking)");
                }
                Ok((blob, None))
            }
            12 => {
                let (blob, _review) = stage12_review::run(&doc.topic, &doc.sections, &self.ctx).await?;
                Ok((blob, None))
            }
            13 => {
                let blob = stage13_finalization::run(doc);
                Ok((blob, None))
            }
            14 => {
                let blob = stage14_delivery::run(doc);
                Ok((blob, None))
            }
            other => Err(SynthError::SchemaInvariant(format!("unknown stage ordinal {other}"))),
        }
    }

    fn require_stage1<'a>(&self, state: &'a WorkingState) -> Result<&'a synth_providers::schemas::ChapterAnalysisOutput> {
        state.stage1.as_ref().ok_or_else(|| SynthError::SchemaInvariant("stage requires stage 1 output in working state".to_string()))
    }

    fn require_stage2<'a>(&self, state: &'a WorkingState) -> Result<&'a synth_providers::schemas::ContextBuildingOutput> {
        state.stage2.as_ref().ok_or_else(|| SynthError::SchemaInvariant("stage requires stage 2 output in working state".to_string()))
    }
}
