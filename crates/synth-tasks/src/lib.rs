//! Background Task Adapter (§4.I): submits full orchestrator runs and
//! per-Chapter post-ingestion jobs to a worker pool, tracking a [`Task`]
//! row's status and serializing jobs by entity id so a Document is never
//! advanced by two concurrent runs at once.

pub mod adapter;
pub mod job;

pub use adapter::BackgroundTaskAdapter;
pub use job::{FnJob, Job};
