//! Pipeline domain types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Pipeline record
///
/// Created by the pipeline service, mutated by the orchestrator running it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub status: PipelineStatus,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Pipeline {
    /// Builds a fresh pipeline record in the `Created` state
    pub fn new(user_id: Uuid, name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            status: PipelineStatus::Created,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Pipeline status
///
/// ```text
/// Created ──► Running ──► Completed
///    │  ▲        │  └───► Failed
///    │  └ Paused │
///    └───────────┴──────► Cancelled ◄── CancelFailed
/// ```
///
/// A run whose cancel request failed still settles on `Completed` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PipelineStatus {
    Created,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
    /// A cancel request could not be applied. Not terminal: cancel may be retried.
    #[serde(rename = "Failed to Cancel")]
    CancelFailed,
}

impl PipelineStatus {
    pub const ALL: [PipelineStatus; 7] = [
        PipelineStatus::Created,
        PipelineStatus::Running,
        PipelineStatus::Paused,
        PipelineStatus::Completed,
        PipelineStatus::Failed,
        PipelineStatus::Cancelled,
        PipelineStatus::CancelFailed,
    ];

    /// States a pipeline may be started from
    pub const STARTABLE: [PipelineStatus; 2] = [PipelineStatus::Created, PipelineStatus::Paused];

    /// States a pipeline may be cancelled from
    pub const CANCELLABLE: [PipelineStatus; 4] = [
        PipelineStatus::Created,
        PipelineStatus::Running,
        PipelineStatus::Paused,
        PipelineStatus::CancelFailed,
    ];

    /// States a pipeline may be rolled back from
    pub const ROLLBACKABLE: [PipelineStatus; 2] =
        [PipelineStatus::Failed, PipelineStatus::Cancelled];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineStatus::Completed | PipelineStatus::Failed | PipelineStatus::Cancelled
        )
    }

    pub fn can_start(self) -> bool {
        Self::STARTABLE.contains(&self)
    }

    pub fn can_cancel(self) -> bool {
        Self::CANCELLABLE.contains(&self)
    }

    /// Whether `self -> next` is an edge of the pipeline state machine
    pub fn can_transition_to(self, next: PipelineStatus) -> bool {
        match next {
            PipelineStatus::Running => self.can_start(),
            PipelineStatus::Paused => self == PipelineStatus::Running,
            PipelineStatus::Completed | PipelineStatus::Failed => matches!(
                self,
                PipelineStatus::Running | PipelineStatus::CancelFailed
            ),
            PipelineStatus::Cancelled => self.can_cancel(),
            PipelineStatus::CancelFailed => matches!(
                self,
                PipelineStatus::Created | PipelineStatus::Running | PipelineStatus::Paused
            ),
            PipelineStatus::Created => false,
        }
    }

    /// Every state with an edge into `self`, for conditional status writes
    pub fn predecessors(self) -> Vec<PipelineStatus> {
        Self::ALL
            .into_iter()
            .filter(|from| from.can_transition_to(self))
            .collect()
    }

    /// Wire/storage representation
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStatus::Created => "Created",
            PipelineStatus::Running => "Running",
            PipelineStatus::Paused => "Paused",
            PipelineStatus::Completed => "Completed",
            PipelineStatus::Failed => "Failed",
            PipelineStatus::Cancelled => "Cancelled",
            PipelineStatus::CancelFailed => "Failed to Cancel",
        }
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PipelineStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(PipelineStatus::Created),
            "Running" => Ok(PipelineStatus::Running),
            "Paused" => Ok(PipelineStatus::Paused),
            "Completed" => Ok(PipelineStatus::Completed),
            "Failed" => Ok(PipelineStatus::Failed),
            "Cancelled" => Ok(PipelineStatus::Cancelled),
            "Failed to Cancel" => Ok(PipelineStatus::CancelFailed),
            other => Err(format!("unknown pipeline status: {other}")),
        }
    }
}
