//! Built-in stage used for every persisted stage record
//!
//! Simulates a unit of work by waiting for a configured duration and echoes
//! its input back, tagged with the stage name.

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};
use stagehand_core::domain::stage::StageRecord;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Stage, StageContext, StageError, StageFactory};

pub struct BasicStage {
    id: Uuid,
    name: String,
    work: Duration,
}

impl BasicStage {
    pub fn new(id: Uuid, name: impl Into<String>, work: Duration) -> Self {
        Self {
            id,
            name: name.into(),
            work,
        }
    }
}

#[async_trait]
impl Stage for BasicStage {
    fn id(&self) -> Uuid {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext, input: &JsonValue) -> Result<JsonValue, StageError> {
        info!(
            "Executing stage: {} ({}) for pipeline: {}",
            self.name, self.id, ctx.pipeline_name
        );

        if ctx.is_cancelled() {
            debug!("Stage {} skipped, run already cancelled", self.name);
            return Err(StageError::Cancelled);
        }

        tokio::select! {
            _ = tokio::time::sleep(self.work) => {}
            _ = ctx.cancelled() => {
                debug!("Stage {} interrupted by cancellation", self.name);
                return Err(StageError::Cancelled);
            }
        }

        Ok(json!({
            "stage": self.name,
            "input": input,
        }))
    }

    async fn handle_error(&self, _ctx: &StageContext, err: StageError) -> StageError {
        match err {
            StageError::Cancelled => StageError::Cancelled,
            StageError::Failed(msg) => {
                StageError::Failed(format!("stage execution failed: {}", msg))
            }
        }
    }

    async fn rollback(&self, ctx: &StageContext, input: &JsonValue) -> Result<(), StageError> {
        info!(
            "Rolling back stage {} ({}) of pipeline {} with input: {}",
            self.name, self.id, ctx.pipeline_name, input
        );
        Ok(())
    }
}

/// Builds a [`BasicStage`] for every stage record
pub struct BasicStageFactory {
    work: Duration,
}

impl BasicStageFactory {
    pub fn new(work: Duration) -> Self {
        Self { work }
    }
}

impl StageFactory for BasicStageFactory {
    fn build(&self, record: &StageRecord) -> Arc<dyn Stage> {
        Arc::new(BasicStage::new(record.id, record.name.clone(), self.work))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_execute_echoes_input() {
        let stage = BasicStage::new(Uuid::new_v4(), "transform", Duration::ZERO);
        let ctx = StageContext::new(Uuid::new_v4(), "etl");

        let output = stage.execute(&ctx, &json!({"k": "v"})).await.unwrap();

        assert_eq!(output["stage"], "transform");
        assert_eq!(output["input"]["k"], "v");
    }

    #[tokio::test]
    async fn test_execute_stops_when_cancelled() {
        let stage = BasicStage::new(Uuid::new_v4(), "load", Duration::from_secs(60));
        let token = CancellationToken::new();
        let ctx = StageContext::with_cancellation(Uuid::new_v4(), "etl", token.clone()).child();
        token.cancel();

        let result = stage.execute(&ctx, &JsonValue::Null).await;
        assert_eq!(result, Err(StageError::Cancelled));
    }

    #[tokio::test]
    async fn test_execute_skips_work_for_cancelled_run() {
        let stage = BasicStage::new(Uuid::new_v4(), "load", Duration::ZERO);
        let token = CancellationToken::new();
        token.cancel();
        let ctx = StageContext::with_cancellation(Uuid::new_v4(), "etl", token).child();
        assert!(ctx.is_cancelled());

        // Zero work would race the cancellation inside select
        let result = stage.execute(&ctx, &JsonValue::Null).await;
        assert_eq!(result, Err(StageError::Cancelled));
    }

    #[tokio::test]
    async fn test_handle_error_wraps_failures_only() {
        let stage = BasicStage::new(Uuid::new_v4(), "fetch", Duration::ZERO);
        let ctx = StageContext::new(Uuid::new_v4(), "etl");

        let wrapped = stage.handle_error(&ctx, StageError::failed("boom")).await;
        assert_eq!(wrapped.to_string(), "stage execution failed: boom");

        let cancelled = stage.handle_error(&ctx, StageError::Cancelled).await;
        assert_eq!(cancelled, StageError::Cancelled);
    }

    #[test]
    fn test_factory_keeps_record_identity() {
        let record = StageRecord::pending(Uuid::new_v4(), "fetch", 0);
        let stage = BasicStageFactory::new(Duration::ZERO).build(&record);

        assert_eq!(stage.id(), record.id);
        assert_eq!(stage.name(), "fetch");
    }
}
