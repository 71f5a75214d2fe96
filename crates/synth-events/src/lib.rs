//! Progress Emitter (§4.G): publishes stage/progress/completion/failure
//! events to subscribers keyed by entity id (`document:<id>`, `task:<id>`).
//! Transport-agnostic per §9's design note — the orchestrator depends only
//! on [`Publisher::publish`]; a push channel, checkpoint-table poller, or a
//! message broker can all implement it.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, trace};

/// Closed set of event kinds (§4.G, §6 event envelope).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Progress,
    Completed,
    Failed,
    Notification,
    Ping,
}

/// The wire envelope from §6: `{event, timestamp, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event: EventKind,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub data: serde_json::Value,
}

impl Event {
    pub fn new(event: EventKind, data: serde_json::Value) -> Self {
        Self { event, timestamp: chrono::Utc::now(), data }
    }

    /// A Stage-boundary progress event (§4.H: "emits a `progress` event"
    /// after every successful stage).
    pub fn progress(stage: u8, ordinal: u32, total: u32, message: impl Into<String>, details: serde_json::Value) -> Self {
        let percent = if total == 0 { 0.0 } else { (ordinal as f32 / total as f32) * 100.0 };
        Self::new(
            EventKind::Progress,
            serde_json::json!({
                "stage": stage,
                "ordinal": ordinal,
                "total": total,
                "percent": percent,
                "message": message.into(),
                "details": details,
            }),
        )
    }

    pub fn completed(summary: serde_json::Value) -> Self {
        Self::new(EventKind::Completed, summary)
    }

    /// §7 "the subscription topic receives exactly one `failed` event; no
    /// further events on that topic" — enforcement of the "exactly one" and
    /// "no further events" parts is the orchestrator's responsibility (it
    /// simply stops publishing); this broker delivers whatever it is given.
    pub fn failed(error_kind: impl Into<String>, details: impl Into<String>) -> Self {
        Self::new(EventKind::Failed, serde_json::json!({ "error_kind": error_kind.into(), "details": details.into() }))
    }

    pub fn notification(message: impl Into<String>) -> Self {
        Self::new(EventKind::Notification, serde_json::json!({ "message": message.into() }))
    }

    pub fn ping() -> Self {
        Self::new(EventKind::Ping, serde_json::Value::Null)
    }
}

/// Capability interface the orchestrator depends on (§9): `publish(topic,
/// event)`, transport-agnostic.
pub trait Publisher: Send + Sync {
    /// Sending never blocks the orchestrator (§4.G): delivery is best-effort
    /// and a topic with no subscribers is a silent no-op, not an error.
    fn publish(&self, topic: &str, event: Event);
}

/// Per-topic [`tokio::sync::broadcast`] channels (§4.G: many-to-one per
/// topic, best-effort, no persistent queue). A topic's channel is created
/// lazily on first subscribe and dropped once its last subscriber goes away
/// ("dead subscribers are evicted").
pub struct TopicBroker {
    topics: DashMap<String, broadcast::Sender<Event>>,
    capacity: usize,
}

impl TopicBroker {
    pub fn new(capacity: usize) -> Self {
        Self { topics: DashMap::new(), capacity: capacity.max(1) }
    }

    /// Joins `topic` explicitly (§6: "Clients join/leave topics explicitly").
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<Event> {
        let sender = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone();
        sender.subscribe()
    }

    /// Same join as [`Self::subscribe`], wrapped as a [`tokio_stream::Stream`]
    /// of `Result<Event, BroadcastStreamRecvError>` — the shape a server-push
    /// transport (§6: "server-push over a long-lived channel") consumes
    /// directly instead of polling `recv()` by hand. A `Lagged` error
    /// surfaces as one `Err` item; the stream keeps yielding afterward.
    pub fn subscribe_stream(
        &self,
        topic: &str,
    ) -> impl tokio_stream::Stream<Item = Result<Event, BroadcastStreamRecvError>> {
        BroadcastStream::new(self.subscribe(topic))
    }

    /// Number of currently-subscribed receivers for a topic; used to decide
    /// whether a topic entry can be evicted after a publish finds no one
    /// listening.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map(|s| s.receiver_count()).unwrap_or(0)
    }
}

impl Default for TopicBroker {
    fn default() -> Self {
        // 256 buffered events per topic is generous relative to a single
        // document's 14-stage run; a slow subscriber that falls behind sees
        // a `Lagged` error on its next recv rather than blocking the publisher.
        Self::new(256)
    }
}

impl Publisher for TopicBroker {
    fn publish(&self, topic: &str, event: Event) {
        let should_evict = match self.topics.get(topic) {
            Some(sender) => {
                // broadcast::Sender::send is synchronous and never awaits;
                // a Err(SendError) here just means zero receivers, which is
                // the expected steady state for a topic nobody is watching.
                let _ = sender.send(event);
                sender.receiver_count() == 0
            }
            None => {
                trace!(topic, "publish to topic with no subscribers ever registered, dropping");
                return;
            }
        };
        if should_evict {
            debug!(topic, "evicting topic with no remaining subscribers");
            self.topics.remove(topic);
        }
    }
}

/// Topic-name helpers (§4.G: `document:<id>`, `task:<id>`).
pub fn document_topic(id: uuid::Uuid) -> String {
    format!("document:{id}")
}

pub fn task_topic(id: uuid::Uuid) -> String {
    format!("task:{id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events_in_emission_order() {
        let broker = TopicBroker::default();
        let topic = document_topic(uuid::Uuid::new_v4());
        let mut rx = broker.subscribe(&topic);

        broker.publish(&topic, Event::progress(1, 1, 14, "stage 1", serde_json::json!({})));
        broker.publish(&topic, Event::progress(2, 2, 14, "stage 2", serde_json::json!({})));
        broker.publish(&topic, Event::completed(serde_json::json!({"ok": true})));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        let third = rx.recv().await.unwrap();
        assert_eq!(first.data["stage"], 1);
        assert_eq!(second.data["stage"], 2);
        assert_eq!(third.event, EventKind::Completed);
    }

    #[tokio::test]
    async fn publish_with_no_subscribers_does_not_panic_or_block() {
        let broker = TopicBroker::default();
        broker.publish("document:nobody-listening", Event::ping());
    }

    #[tokio::test]
    async fn many_to_one_delivery_reaches_every_subscriber() {
        let broker = TopicBroker::default();
        let topic = task_topic(uuid::Uuid::new_v4());
        let mut a = broker.subscribe(&topic);
        let mut b = broker.subscribe(&topic);

        broker.publish(&topic, Event::notification("hello"));

        assert_eq!(a.recv().await.unwrap().event, EventKind::Notification);
        assert_eq!(b.recv().await.unwrap().event, EventKind::Notification);
    }

    #[tokio::test]
    async fn subscribe_stream_yields_events_in_order() {
        use tokio_stream::StreamExt;

        let broker = TopicBroker::default();
        let topic = document_topic(uuid::Uuid::new_v4());
        let mut stream = Box::pin(broker.subscribe_stream(&topic));

        broker.publish(&topic, Event::progress(1, 1, 14, "stage 1", serde_json::json!({})));
        broker.publish(&topic, Event::completed(serde_json::json!({"ok": true})));

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.data["stage"], 1);
        assert_eq!(second.event, EventKind::Completed);
    }

    #[tokio::test]
    async fn topic_is_evicted_once_last_subscriber_drops() {
        let broker = TopicBroker::default();
        let topic = document_topic(uuid::Uuid::new_v4());
        let rx = broker.subscribe(&topic);
        assert_eq!(broker.subscriber_count(&topic), 1);
        drop(rx);

        broker.publish(&topic, Event::ping());
        assert_eq!(broker.subscriber_count(&topic), 0);
    }
}
