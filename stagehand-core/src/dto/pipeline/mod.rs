//! Pipeline DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::{Pipeline, PipelineStatus};

/// Request to create a new pipeline with its stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub user_id: Uuid,
    pub name: String,
    /// Expected number of stages; must match `stage_names`
    #[serde(alias = "stages")]
    pub stage_count: i32,
    pub stage_names: Vec<String>,
}

/// Response to a successful create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCreated {
    pub message: String,
    pub pipeline_id: Uuid,
}

/// Request to start a pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartPipeline {
    pub user_id: Uuid,
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Request to cancel a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelPipeline {
    pub user_id: Uuid,
}

/// Request to roll back a failed or cancelled pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackPipeline {
    #[serde(default)]
    pub input: serde_json::Value,
}

/// Current status of a pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStatusResponse {
    pub pipeline_id: Uuid,
    pub status: PipelineStatus,
}

/// Listing entry for a user's pipelines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub id: Uuid,
    pub name: String,
    pub status: PipelineStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<Pipeline> for PipelineSummary {
    fn from(pipeline: Pipeline) -> Self {
        Self {
            id: pipeline.id,
            name: pipeline.name,
            status: pipeline.status,
            updated_at: pipeline.updated_at,
        }
    }
}

/// A stage that did not complete (or could not be rolled back)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage_id: Uuid,
    pub stage_name: String,
    pub message: String,
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stage '{}' failed: {}", self.stage_name, self.message)
    }
}

/// Aggregated outcome of one pipeline run
///
/// `results` holds the outputs of the stages that completed, in completion
/// order (not submission order).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub pipeline_id: Uuid,
    pub status: PipelineStatus,
    pub results: Vec<serde_json::Value>,
    pub failures: Vec<StageFailure>,
}

impl RunReport {
    /// Representative failure of the run, if any stage failed
    pub fn error(&self) -> Option<&StageFailure> {
        self.failures.first()
    }

    pub fn succeeded(&self) -> bool {
        self.status == PipelineStatus::Completed
    }
}

/// Outcome of an explicit rollback request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackReport {
    pub pipeline_id: Uuid,
    pub rolled_back: usize,
    pub failures: Vec<StageFailure>,
}
