//! Test fixtures shared by the unit tests

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};
use stagehand_core::domain::event::StatusEvent;
use stagehand_core::domain::pipeline::Pipeline;
use stagehand_core::domain::stage::StageRecord;
use stagehand_core::domain::user::User;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::events::StatusSink;
use crate::repository::PipelineRepository;
use crate::stage::{Stage, StageContext, StageError, StageFactory};

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().clone()
    }

    pub fn saw_stage(&self, stage: &str, status: &str) -> bool {
        self.events
            .lock()
            .iter()
            .any(|e| e.stage_name.as_deref() == Some(stage) && e.status == status)
    }
}

impl StatusSink for RecordingSink {
    fn notify(&self, event: StatusEvent) {
        self.events.lock().push(event);
    }
}

#[derive(Debug, Clone)]
pub enum Behaviour {
    Succeed,
    Fail(String),
    Panic,
    UntilCancelled,
}

/// Stage whose outcome is fixed up front
pub struct ScriptedStage {
    id: Uuid,
    name: String,
    behaviour: Behaviour,
    delay: Duration,
    failing_rollback: bool,
}

impl ScriptedStage {
    pub fn new(name: &str, behaviour: Behaviour) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            behaviour,
            delay: Duration::ZERO,
            failing_rollback: false,
        }
    }

    pub fn ok(name: &str) -> Self {
        Self::new(name, Behaviour::Succeed)
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::new(name, Behaviour::Fail(message.to_string()))
    }

    pub fn panicking(name: &str) -> Self {
        Self::new(name, Behaviour::Panic)
    }

    pub fn until_cancelled(name: &str) -> Self {
        Self::new(name, Behaviour::UntilCancelled)
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failing_rollback(mut self) -> Self {
        self.failing_rollback = true;
        self
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext, input: &JsonValue) -> Result<JsonValue, StageError> {
        if !self.delay.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(self.delay) => {}
                _ = ctx.cancelled() => return Err(StageError::Cancelled),
            }
        }

        match &self.behaviour {
            Behaviour::Succeed => Ok(json!({ "stage": self.name, "input": input })),
            Behaviour::Fail(message) => Err(StageError::failed(message.clone())),
            Behaviour::Panic => panic!("stage {} blew up", self.name),
            Behaviour::UntilCancelled => {
                ctx.cancelled().await;
                Err(StageError::Cancelled)
            }
        }
    }

    async fn rollback(&self, _ctx: &StageContext, _input: &JsonValue) -> Result<(), StageError> {
        if self.failing_rollback {
            return Err(StageError::failed("rollback refused"));
        }
        Ok(())
    }
}

/// Factory producing succeeding stages unless told otherwise by stage name
#[derive(Default)]
pub struct ScriptedStageFactory {
    overrides: Mutex<HashMap<String, Behaviour>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl ScriptedStageFactory {
    pub fn fail(&self, stage: &str, message: &str) {
        self.overrides
            .lock()
            .insert(stage.to_string(), Behaviour::Fail(message.to_string()));
    }

    pub fn block_until_cancelled(&self, stage: &str) {
        self.overrides
            .lock()
            .insert(stage.to_string(), Behaviour::UntilCancelled);
    }

    /// Hold the named stage for `delay` before it settles
    pub fn delay(&self, stage: &str, delay: Duration) {
        self.delays.lock().insert(stage.to_string(), delay);
    }
}

impl StageFactory for ScriptedStageFactory {
    fn build(&self, record: &StageRecord) -> Arc<dyn Stage> {
        let behaviour = self
            .overrides
            .lock()
            .get(&record.name)
            .cloned()
            .unwrap_or(Behaviour::Succeed);
        let delay = self
            .delays
            .lock()
            .get(&record.name)
            .copied()
            .unwrap_or_default();
        Arc::new(
            ScriptedStage::new(&record.name, behaviour)
                .with_id(record.id)
                .with_delay(delay),
        )
    }
}

/// Persist a user, a pipeline and its pending stage records
pub async fn seed_pipeline(
    repo: &dyn PipelineRepository,
    name: &str,
    stage_names: &[&str],
) -> (Uuid, Uuid, Vec<StageRecord>) {
    let user = User::new("seed@example.com");
    repo.save_user(&user).await.unwrap();

    let pipeline = Pipeline::new(user.id, name);
    repo.save_pipeline_execution(&pipeline).await.unwrap();

    let mut records = Vec::new();
    for (position, stage_name) in stage_names.iter().enumerate() {
        let record = StageRecord::pending(pipeline.id, *stage_name, position as i32);
        repo.save_stage(&record).await.unwrap();
        records.push(record);
    }

    (user.id, pipeline.id, records)
}
