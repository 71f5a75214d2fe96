//! Synthesis Orchestrator (§4.H): the 14-stage state machine that turns a
//! topic into a synthesized, fact-checked chapter. Depends on the Provider
//! Gateway, Retrieval Service, Deduplication Engine, Relevance Filter, Gap
//! Analyzer, Fact Checker, and Progress Emitter; owns no storage of its own.

pub mod context;
pub mod image_matching;
pub mod orchestrator;
pub mod stage1_input_validation;
pub mod stage2_context_building;
pub mod stage3_internal_retrieval;
pub mod stage4_external_retrieval;
pub mod stage5_planning;
pub mod stage6_section_generation;
pub mod stage7_image_integration;
pub mod stage8_citation_network;
pub mod stage9_quality_assurance;
pub mod stage10_fact_checking;
pub mod stage11_formatting;
pub mod stage12_review;
pub mod stage13_finalization;
pub mod stage14_delivery;
pub mod types;

pub use context::OrchestratorContext;
pub use orchestrator::SynthesisOrchestrator;
pub use types::{AvailableImage, WorkingState};
