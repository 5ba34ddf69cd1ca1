//! Bounded cache of live pipeline orchestrators
//!
//! Entries are evicted in insertion order once the capacity is reached. An
//! entry is only evictable while nobody outside the registry holds it and no
//! run is in flight, so the registry may temporarily grow past its capacity.
//! Evicted pipelines are rebuilt from the repository on next access.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::orchestrator::PipelineOrchestrator;

#[derive(Default)]
struct Entries {
    by_id: HashMap<Uuid, Arc<PipelineOrchestrator>>,
    order: VecDeque<Uuid>,
}

pub struct OrchestratorRegistry {
    capacity: usize,
    entries: RwLock<Entries>,
}

impl OrchestratorRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(Entries::default()),
        }
    }

    pub fn get(&self, pipeline_id: Uuid) -> Option<Arc<PipelineOrchestrator>> {
        self.entries.read().by_id.get(&pipeline_id).cloned()
    }

    /// Register an orchestrator and return the one now held for its pipeline
    ///
    /// If the pipeline is already registered the existing entry wins.
    pub fn insert(&self, orchestrator: Arc<PipelineOrchestrator>) -> Arc<PipelineOrchestrator> {
        let pipeline_id = orchestrator.pipeline_id();
        let mut entries = self.entries.write();
        if let Some(existing) = entries.by_id.get(&pipeline_id) {
            return existing.clone();
        }

        Self::evict(&mut entries, self.capacity);
        entries.by_id.insert(pipeline_id, orchestrator.clone());
        entries.order.push_back(pipeline_id);
        orchestrator
    }

    pub fn remove(&self, pipeline_id: Uuid) -> Option<Arc<PipelineOrchestrator>> {
        let mut entries = self.entries.write();
        let removed = entries.by_id.remove(&pipeline_id)?;
        entries.order.retain(|id| *id != pipeline_id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pipeline_id: Uuid) -> bool {
        self.entries.read().by_id.contains_key(&pipeline_id)
    }

    /// Drop idle entries, oldest first, until there is room for one more
    fn evict(entries: &mut Entries, capacity: usize) {
        let mut index = 0;
        while entries.by_id.len() >= capacity && index < entries.order.len() {
            let id = entries.order[index];
            let idle = entries
                .by_id
                .get(&id)
                .is_none_or(|o| Arc::strong_count(o) == 1 && !o.is_running());
            if idle {
                entries.by_id.remove(&id);
                entries.order.remove(index);
                debug!("Evicted orchestrator for pipeline {}", id);
            } else {
                index += 1;
            }
        }
    }
}
