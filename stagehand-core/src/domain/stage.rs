//! Stage domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted stage of a pipeline
///
/// All records of a pipeline are created together with the pipeline; the
/// orchestrator is the only writer afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub name: String,
    /// Creation order within the pipeline, starting at 0
    pub position: i32,
    pub status: StageStatus,
    pub error_message: Option<String>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl StageRecord {
    /// Builds a `Pending` stage record
    pub fn pending(pipeline_id: Uuid, name: impl Into<String>, position: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            name: name.into(),
            position,
            status: StageStatus::Pending,
            error_message: None,
            updated_at: chrono::Utc::now(),
        }
    }
}

/// Stage status within one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl StageStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, StageStatus::Completed | StageStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageStatus::Pending => "Pending",
            StageStatus::Running => "Running",
            StageStatus::Completed => "Completed",
            StageStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(StageStatus::Pending),
            "Running" => Ok(StageStatus::Running),
            "Completed" => Ok(StageStatus::Completed),
            "Failed" => Ok(StageStatus::Failed),
            other => Err(format!("unknown stage status: {other}")),
        }
    }
}
