//! Execution log domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::stage::StageStatus;

/// Outcome of a single stage in one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: Uuid,
    pub pipeline_id: Uuid,
    pub stage_id: Uuid,
    pub stage_name: String,
    pub status: StageStatus,
    pub error_message: Option<String>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

impl ExecutionLog {
    pub fn completed(pipeline_id: Uuid, stage_id: Uuid, stage_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline_id,
            stage_id,
            stage_name: stage_name.to_string(),
            status: StageStatus::Completed,
            error_message: None,
            recorded_at: chrono::Utc::now(),
        }
    }

    pub fn failed(pipeline_id: Uuid, stage_id: Uuid, stage_name: &str, message: String) -> Self {
        Self {
            status: StageStatus::Failed,
            error_message: Some(message),
            ..Self::completed(pipeline_id, stage_id, stage_name)
        }
    }
}
