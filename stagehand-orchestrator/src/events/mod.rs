//! Status event sinks
//!
//! The orchestrator publishes every stage and pipeline transition to a
//! [`StatusSink`]. Delivery is fire-and-forget: sinks never report back and a
//! failing observer never affects the pipeline run.

mod broadcast;

use stagehand_core::domain::event::StatusEvent;
use std::sync::Arc;

pub use broadcast::BroadcastSink;

/// Publish-only channel for live status notifications
pub trait StatusSink: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Sink that writes every event to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl StatusSink for TracingSink {
    fn notify(&self, event: StatusEvent) {
        match &event.stage_name {
            Some(stage) => tracing::debug!(
                "[{}] stage {} -> {}",
                event.pipeline_name,
                stage,
                event.status
            ),
            None => tracing::debug!("[{}] pipeline -> {}", event.pipeline_name, event.status),
        }
    }
}

/// Sink that forwards each event to several sinks
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn StatusSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl StatusSink for FanoutSink {
    fn notify(&self, event: StatusEvent) {
        for sink in &self.sinks {
            sink.notify(event.clone());
        }
    }
}
