use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::trace;

use crate::dao::models::PersonId;

const EVENT_CONNECTIVITY_CHANGED: &str = "connectivity-changed";
const EVENT_PENDING_COUNT_CHANGED: &str = "pending-count-changed";
const EVENT_SCORES_SYNCED: &str = "scores-synced";

/// Notifications published for the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SyncEvent {
    /// The tracker flipped between online and offline.
    ConnectivityChanged { connected: bool, was_connected: bool },
    /// A judge's durable queue was mutated.
    PendingCountChanged { judge: PersonId, count: usize },
    /// A batch upload confirmed scores; open views should refetch.
    ScoresSynced {
        judge: PersonId,
        succeeded: usize,
        failed: usize,
    },
}

impl SyncEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::ConnectivityChanged { .. } => EVENT_CONNECTIVITY_CHANGED,
            SyncEvent::PendingCountChanged { .. } => EVENT_PENDING_COUNT_CHANGED,
            SyncEvent::ScoresSynced { .. } => EVENT_SCORES_SYNCED,
        }
    }
}

/// Broadcast hub fanning [`SyncEvent`]s out to every subscriber.
pub struct EventHub {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventHub {
    /// Construct a hub backed by a Tokio broadcast channel with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream; lagging subscribers observe a `Lagged` error item.
    pub fn stream(&self) -> BroadcastStream<SyncEvent> {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn broadcast(&self, event: SyncEvent) {
        trace!(event = event.name(), "publishing sync event");
        let _ = self.sender.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(64)
    }
}
