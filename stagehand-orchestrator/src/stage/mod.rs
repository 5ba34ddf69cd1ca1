//! Stage abstraction
//!
//! A stage is an opaque unit of work. The orchestrator only relies on the
//! capability set exposed by [`Stage`]: execute, handle an execution error,
//! and roll back on explicit request.
//!
//! All traits are object-safe so stages can be mixed freely inside one pipeline.

mod basic;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use stagehand_core::domain::stage::StageRecord;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use basic::{BasicStage, BasicStageFactory};

/// Error produced by a stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("{0}")]
    Failed(String),

    #[error("cancelled")]
    Cancelled,
}

impl StageError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Per-run context handed to every stage
///
/// Cloning is cheap; each stage receives its own child cancellation token.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    cancellation: CancellationToken,
}

impl StageContext {
    pub fn new(pipeline_id: Uuid, pipeline_name: impl Into<String>) -> Self {
        Self::with_cancellation(pipeline_id, pipeline_name, CancellationToken::new())
    }

    pub fn with_cancellation(
        pipeline_id: Uuid,
        pipeline_name: impl Into<String>,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            pipeline_id,
            pipeline_name: pipeline_name.into(),
            cancellation,
        }
    }

    /// Context for one stage, cancelled together with the run
    pub fn child(&self) -> Self {
        Self {
            pipeline_id: self.pipeline_id,
            pipeline_name: self.pipeline_name.clone(),
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Resolves once the pipeline run is cancelled
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await
    }
}

/// A schedulable unit of work
///
/// Implementations must tolerate running concurrently with sibling stages of
/// the same pipeline and must not touch shared pipeline state; the orchestrator
/// owns result collection and status reporting.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> Uuid;

    fn name(&self) -> &str;

    /// Perform the unit of work
    async fn execute(&self, ctx: &StageContext, input: &JsonValue) -> Result<JsonValue, StageError>;

    /// Turn an execution error into the error that gets reported
    ///
    /// Never retries. The default keeps the error as is.
    async fn handle_error(&self, _ctx: &StageContext, err: StageError) -> StageError {
        err
    }

    /// Best-effort compensation, only run on an explicit rollback request
    async fn rollback(&self, _ctx: &StageContext, _input: &JsonValue) -> Result<(), StageError> {
        Ok(())
    }
}

/// Materialises executable stages from persisted stage records
///
/// Used when a pipeline is created and whenever its orchestrator has to be
/// rebuilt from the repository.
pub trait StageFactory: Send + Sync {
    fn build(&self, record: &StageRecord) -> Arc<dyn Stage>;
}
