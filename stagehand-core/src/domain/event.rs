//! Status event published to observers while a pipeline runs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::pipeline::PipelineStatus;
use crate::domain::stage::StageStatus;

/// Live status notification
///
/// `stage_name` is `None` for pipeline-level transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub pipeline_id: Uuid,
    pub pipeline_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StatusEvent {
    pub fn stage(
        pipeline_id: Uuid,
        pipeline_name: &str,
        stage_name: &str,
        status: StageStatus,
    ) -> Self {
        Self {
            pipeline_id,
            pipeline_name: pipeline_name.to_string(),
            stage_name: Some(stage_name.to_string()),
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn pipeline(pipeline_id: Uuid, pipeline_name: &str, status: PipelineStatus) -> Self {
        Self {
            pipeline_id,
            pipeline_name: pipeline_name.to_string(),
            stage_name: None,
            status: status.to_string(),
            timestamp: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_event_json_shape() {
        let event = StatusEvent::stage(Uuid::nil(), "etl", "fetch", StageStatus::Running);
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["pipeline_name"], "etl");
        assert_eq!(value["stage_name"], "fetch");
        assert_eq!(value["status"], "Running");
    }

    #[test]
    fn test_pipeline_event_omits_stage_name() {
        let event = StatusEvent::pipeline(Uuid::nil(), "etl", PipelineStatus::CancelFailed);
        let value = serde_json::to_value(&event).unwrap();

        assert!(value.get("stage_name").is_none());
        assert_eq!(value["status"], "Failed to Cancel");
    }
}
