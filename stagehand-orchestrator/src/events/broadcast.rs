//! Push-based broadcaster backed by a tokio broadcast channel
//!
//! Every subscriber (e.g. a WebSocket connection) receives every event sent
//! after it subscribed. Events published while nobody listens are dropped, and
//! subscribers that fall more than `capacity` events behind skip ahead.

use stagehand_core::domain::event::StatusEvent;
use tokio::sync::broadcast;

use super::StatusSink;

#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<StatusEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl StatusSink for BroadcastSink {
    fn notify(&self, event: StatusEvent) {
        // An error only means there are no subscribers right now
        let _ = self.tx.send(event);
    }
}
