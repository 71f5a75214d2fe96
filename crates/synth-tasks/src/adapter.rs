use crate::job::Job;
use dashmap::DashMap;
use metrics::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Instant;
use synth_core::{EntityId, Result, Task, TaskStatus, TaskStore};
use synth_events::{task_topic, Event, Publisher};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

/// Submits long-running orchestrator runs and per-Chapter post-ingestion
/// jobs to a worker pool, tracking status on a [`Task`] row (§4.I). Jobs
/// are serialized by entity id — one document or chapter is never advanced
/// by two concurrent jobs at once, matching §5's "stage N+1 begins only
/// after N's checkpoint write commits" at the granularity this adapter
/// controls (whole-run submission, not individual stages).
///
/// Task rows stand in for queue entries, and `tokio::spawn` plus a
/// per-entity mutex stand in for a dedicated processor loop (this adapter
/// has no fixed worker count to size — document/chapter counts are low
/// enough that a spawn-per-submission model is adequate).
pub struct BackgroundTaskAdapter {
    tasks: Arc<dyn TaskStore>,
    publisher: Arc<dyn Publisher>,
    entity_locks: DashMap<EntityId, Arc<AsyncMutex<()>>>,
}

impl BackgroundTaskAdapter {
    pub fn new(tasks: Arc<dyn TaskStore>, publisher: Arc<dyn Publisher>) -> Self {
        Self { tasks, publisher, entity_locks: DashMap::new() }
    }

    fn entity_lock(&self, entity_id: EntityId) -> Arc<AsyncMutex<()>> {
        self.entity_locks.entry(entity_id).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
    }

    /// Creates a `Task` row and spawns `job` against `entity_id`, holding
    /// that entity's lock for the job's duration. Returns the task id
    /// immediately; the job itself runs in the background.
    pub async fn submit(
        &self,
        task_type: impl Into<String>,
        entity_id: EntityId,
        job: Arc<dyn Job>,
    ) -> Result<EntityId> {
        let task_type = task_type.into();
        let task = Task::new(task_type.clone(), entity_id);
        let task_id = task.id;
        self.tasks.create(task).await?;
        counter!("tasks_submitted_total").increment(1);
        info!(%task_id, %entity_id, task_type, "task submitted");

        let lock = self.entity_lock(entity_id);
        let tasks = self.tasks.clone();
        let publisher = self.publisher.clone();

        tokio::spawn(async move {
            let _permit = lock.lock().await;
            let topic = task_topic(task_id);
            gauge!("tasks_in_flight").increment(1.0);
            let start = Instant::now();

            if let Err(error) = Self::mark_processing(&tasks, &publisher, task_id, &topic).await {
                error!(%task_id, %error, "failed to persist processing state");
            }

            let outcome = job.run().await;

            match outcome {
                Ok(payload) => {
                    if let Err(error) = Self::mark_completed(&tasks, &publisher, task_id, &topic, payload).await {
                        error!(%task_id, %error, "failed to persist completed state");
                    }
                }
                Err(error) => {
                    warn!(%task_id, %error, "task failed");
                    if let Err(store_error) = Self::mark_failed(&tasks, &publisher, task_id, &topic, error.to_string()).await
                    {
                        error!(%task_id, %store_error, "failed to persist failed state");
                    }
                }
            }

            histogram!("task_duration_seconds").record(start.elapsed().as_secs_f64());
            gauge!("tasks_in_flight").decrement(1.0);
        });

        Ok(task_id)
    }

    async fn mark_processing(
        tasks: &Arc<dyn TaskStore>,
        publisher: &Arc<dyn Publisher>,
        task_id: EntityId,
        topic: &str,
    ) -> Result<()> {
        let mut task = tasks.get(task_id).await?.ok_or_else(|| {
            synth_core::SynthError::UnknownEntity(task_id.to_string())
        })?;
        task.status = TaskStatus::Processing;
        task.started_at = Some(chrono::Utc::now());
        tasks.update(task).await?;
        publisher.publish(topic, Event::progress(0, 0, 1, "task started", serde_json::json!({})));
        Ok(())
    }

    async fn mark_completed(
        tasks: &Arc<dyn TaskStore>,
        publisher: &Arc<dyn Publisher>,
        task_id: EntityId,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<()> {
        let mut task = tasks.get(task_id).await?.ok_or_else(|| {
            synth_core::SynthError::UnknownEntity(task_id.to_string())
        })?;
        task.status = TaskStatus::Completed;
        task.progress_percent = 100.0;
        task.completed_at = Some(chrono::Utc::now());
        tasks.update(task).await?;
        publisher.publish(topic, Event::completed(payload));
        Ok(())
    }

    async fn mark_failed(
        tasks: &Arc<dyn TaskStore>,
        publisher: &Arc<dyn Publisher>,
        task_id: EntityId,
        topic: &str,
        error: String,
    ) -> Result<()> {
        let mut task = tasks.get(task_id).await?.ok_or_else(|| {
            synth_core::SynthError::UnknownEntity(task_id.to_string())
        })?;
        task.status = TaskStatus::Failed;
        task.error = Some(error.clone());
        task.completed_at = Some(chrono::Utc::now());
        tasks.update(task).await?;
        publisher.publish(topic, Event::failed("task_failed", error));
        Ok(())
    }

    /// Reaps tasks completed/failed/cancelled before `retention` has
    /// elapsed since now (§3 Lifecycle: "reaped after a retention window").
    pub async fn reap_expired(&self, retention: chrono::Duration) -> Result<u64> {
        let cutoff = chrono::Utc::now() - retention;
        self.tasks.reap_before(cutoff).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use synth_core::memory::InMemoryTaskStore;
    use synth_events::TopicBroker;

    struct OkJob;
    #[async_trait::async_trait]
    impl Job for OkJob {
        async fn run(&self) -> Result<serde_json::Value> {
            Ok(serde_json::json!({"done": true}))
        }
    }

    struct FailJob;
    #[async_trait::async_trait]
    impl Job for FailJob {
        async fn run(&self) -> Result<serde_json::Value> {
            Err(synth_core::SynthError::ExternalServiceError("boom".to_string()))
        }
    }

    async fn wait_terminal(tasks: &Arc<dyn TaskStore>, id: EntityId) -> Task {
        for _ in 0..200 {
            if let Some(t) = tasks.get(id).await.unwrap() {
                if matches!(t.status, TaskStatus::Completed | TaskStatus::Failed) {
                    return t;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("task never reached a terminal state");
    }

    #[tokio::test]
    async fn successful_job_marks_task_completed_and_emits_events() {
        let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::default());
        let broker = Arc::new(TopicBroker::default());
        let adapter = BackgroundTaskAdapter::new(tasks.clone(), broker.clone());
        let entity_id = uuid::Uuid::new_v4();

        let task_id = adapter.submit("document_synthesis", entity_id, Arc::new(OkJob)).await.unwrap();
        let task = wait_terminal(&tasks, task_id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress_percent, 100.0);
    }

    #[tokio::test]
    async fn failing_job_marks_task_failed_with_error() {
        let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::default());
        let broker = Arc::new(TopicBroker::default());
        let adapter = BackgroundTaskAdapter::new(tasks.clone(), broker.clone());
        let entity_id = uuid::Uuid::new_v4();

        let task_id = adapter.submit("chapter_embedding", entity_id, Arc::new(FailJob)).await.unwrap();
        let task = wait_terminal(&tasks, task_id).await;
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("boom"));
    }

    /// Two jobs submitted against the same entity id must not run
    /// concurrently (§4.I: "serialized by entity id").
    #[tokio::test]
    async fn jobs_on_same_entity_are_serialized() {
        let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::default());
        let broker = Arc::new(TopicBroker::default());
        let adapter = BackgroundTaskAdapter::new(tasks.clone(), broker.clone());
        let entity_id = uuid::Uuid::new_v4();

        let overlap_detected = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicBool::new(false));

        struct SlowJob {
            in_flight: Arc<AtomicBool>,
            overlap_detected: Arc<AtomicBool>,
        }
        #[async_trait::async_trait]
        impl Job for SlowJob {
            async fn run(&self) -> Result<serde_json::Value> {
                if self.in_flight.swap(true, Ordering::SeqCst) {
                    self.overlap_detected.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                self.in_flight.store(false, Ordering::SeqCst);
                Ok(serde_json::json!({}))
            }
        }

        let job_a = Arc::new(SlowJob { in_flight: in_flight.clone(), overlap_detected: overlap_detected.clone() });
        let job_b = Arc::new(SlowJob { in_flight: in_flight.clone(), overlap_detected: overlap_detected.clone() });

        let id_a = adapter.submit("chapter_embedding", entity_id, job_a).await.unwrap();
        let id_b = adapter.submit("chapter_embedding", entity_id, job_b).await.unwrap();

        wait_terminal(&tasks, id_a).await;
        wait_terminal(&tasks, id_b).await;
        assert!(!overlap_detected.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn reap_expired_removes_old_completed_tasks() {
        let tasks: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::default());
        let broker = Arc::new(TopicBroker::default());
        let adapter = BackgroundTaskAdapter::new(tasks.clone(), broker.clone());
        let entity_id = uuid::Uuid::new_v4();

        let task_id = adapter.submit("chapter_embedding", entity_id, Arc::new(OkJob)).await.unwrap();
        wait_terminal(&tasks, task_id).await;

        let reaped = adapter.reap_expired(chrono::Duration::seconds(-1)).await.unwrap();
        assert_eq!(reaped, 1);
        assert!(tasks.get(task_id).await.unwrap().is_none());
    }
}
