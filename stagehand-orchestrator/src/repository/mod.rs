//! Repository Module
//!
//! Data access layer for the orchestrator.
//!
//! The engine only talks to [`PipelineRepository`]; the Postgres implementation
//! delegates to one submodule per table, the in-memory implementation backs
//! tests and database-less deployments.

pub mod log;
pub mod memory;
pub mod pipeline;
pub mod postgres;
pub mod stage;
pub mod user;

use async_trait::async_trait;
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::{Pipeline, PipelineStatus};
use stagehand_core::domain::stage::{StageRecord, StageStatus};
use stagehand_core::domain::user::User;
use uuid::Uuid;

pub use memory::InMemoryPipelineRepository;
pub use postgres::PgPipelineRepository;

// Re-export for convenience
pub use log as log_repository;
pub use pipeline as pipeline_repository;
pub use stage as stage_repository;
pub use user as user_repository;

/// Repository error type
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Persistence contract consumed by the orchestration engine
///
/// Lookups return `Ok(None)` when the record does not exist; updates against a
/// missing record fail with [`RepositoryError::NotFound`].
#[async_trait]
pub trait PipelineRepository: Send + Sync {
    // -- Pipelines -----------------------------------------------------------

    /// Insert a new pipeline record
    async fn save_pipeline_execution(&self, pipeline: &Pipeline) -> Result<()>;

    /// Atomically write `to` if the current status is one of `from`
    ///
    /// Returns `false` (and writes nothing) when the pipeline is in another state.
    async fn transition_pipeline_status(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool>;

    async fn get_pipeline_status(&self, id: Uuid) -> Result<Option<PipelineStatus>>;

    async fn get_pipeline_by_id(&self, id: Uuid) -> Result<Option<Pipeline>>;

    async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<Pipeline>>;

    /// Delete a pipeline with its stages and logs; returns whether it existed
    ///
    /// A `Running` pipeline is never deleted: that is a [`RepositoryError::Conflict`].
    async fn delete_pipeline(&self, id: Uuid) -> Result<bool>;

    // -- Stages --------------------------------------------------------------

    async fn save_stage(&self, stage: &StageRecord) -> Result<()>;

    /// Write a stage status unless the stage already reached a terminal status
    ///
    /// Returns whether the write applied.
    async fn update_stage_status(
        &self,
        stage_id: Uuid,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<bool>;

    /// Stages of a pipeline in creation order
    async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<StageRecord>>;

    // -- Execution logs ------------------------------------------------------

    async fn save_execution_log(&self, entry: &ExecutionLog) -> Result<()>;

    async fn get_execution_logs(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLog>>;

    // -- Users ---------------------------------------------------------------

    /// Insert a user; a duplicate email is a [`RepositoryError::Conflict`]
    async fn save_user(&self, user: &User) -> Result<()>;

    /// Change a user's email; returns whether the user existed
    async fn update_user(&self, id: Uuid, email: &str) -> Result<bool>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>>;
}
