use async_trait::async_trait;
use synth_core::Result;

/// The unit of work the Background Task Adapter serializes and runs (§4.I):
/// either a full orchestrator run for a Document or a per-Chapter
/// post-ingestion job (embedding, chunking, dedup scan). Kept as a narrow
/// capability trait — same as every other external collaborator in this
/// workspace (§1) — so `synth-tasks` does not need a dependency on
/// `synth-orchestrator` or `synth-ingest`; the binary that wires concrete
/// jobs (`synth-cli`) is the one place that closes the loop.
#[async_trait]
pub trait Job: Send + Sync {
    /// Runs the job to completion, returning the result payload that gets
    /// attached to the `Task` row and to the `completed` event.
    async fn run(&self) -> Result<serde_json::Value>;
}

/// Adapts a plain async closure into a [`Job`] so callers don't need to
/// define a one-off struct for every submission site.
pub struct FnJob<F> {
    f: F,
}

impl<F, Fut> FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value>> + Send,
{
    async fn run(&self) -> Result<serde_json::Value> {
        (self.f)().await
    }
}
