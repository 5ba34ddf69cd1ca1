//! Postgres implementation of [`PipelineRepository`]

use async_trait::async_trait;
use sqlx::PgPool;
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::{Pipeline, PipelineStatus};
use stagehand_core::domain::stage::{StageRecord, StageStatus};
use stagehand_core::domain::user::User;
use uuid::Uuid;

use super::{
    PipelineRepository, RepositoryError, Result, log_repository, pipeline_repository,
    stage_repository, user_repository,
};

/// Repository backed by a Postgres connection pool
#[derive(Clone)]
pub struct PgPipelineRepository {
    pool: PgPool,
}

impl PgPipelineRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PipelineRepository for PgPipelineRepository {
    async fn save_pipeline_execution(&self, pipeline: &Pipeline) -> Result<()> {
        pipeline_repository::create(&self.pool, pipeline).await?;
        Ok(())
    }

    async fn transition_pipeline_status(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool> {
        if pipeline_repository::transition_status(&self.pool, id, from, to).await? {
            return Ok(true);
        }

        // Distinguish a missing row from a status that did not match
        match pipeline_repository::find_status(&self.pool, id).await? {
            Some(_) => Ok(false),
            None => Err(RepositoryError::NotFound(format!("pipeline {}", id))),
        }
    }

    async fn get_pipeline_status(&self, id: Uuid) -> Result<Option<PipelineStatus>> {
        Ok(pipeline_repository::find_status(&self.pool, id).await?)
    }

    async fn get_pipeline_by_id(&self, id: Uuid) -> Result<Option<Pipeline>> {
        Ok(pipeline_repository::find_by_id(&self.pool, id).await?)
    }

    async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<Pipeline>> {
        Ok(pipeline_repository::find_by_user(&self.pool, user_id).await?)
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool> {
        if pipeline_repository::delete_unless_running(&self.pool, id).await? {
            return Ok(true);
        }

        match pipeline_repository::find_status(&self.pool, id).await? {
            Some(status) => Err(RepositoryError::Conflict(format!(
                "pipeline {} is {}",
                id, status
            ))),
            None => Ok(false),
        }
    }

    async fn save_stage(&self, stage: &StageRecord) -> Result<()> {
        stage_repository::create(&self.pool, stage).await?;
        Ok(())
    }

    async fn update_stage_status(
        &self,
        stage_id: Uuid,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        if stage_repository::update_status(&self.pool, stage_id, status, error_message).await? {
            return Ok(true);
        }

        if stage_repository::exists(&self.pool, stage_id).await? {
            Ok(false)
        } else {
            Err(RepositoryError::NotFound(format!("stage {}", stage_id)))
        }
    }

    async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<StageRecord>> {
        Ok(stage_repository::find_by_pipeline(&self.pool, pipeline_id).await?)
    }

    async fn save_execution_log(&self, entry: &ExecutionLog) -> Result<()> {
        log_repository::add_entry(&self.pool, entry).await?;
        Ok(())
    }

    async fn get_execution_logs(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLog>> {
        Ok(log_repository::find_by_pipeline(&self.pool, pipeline_id).await?)
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        user_repository::create(&self.pool, user)
            .await
            .map_err(|err| unique_violation_as_conflict(err, &user.email))
    }

    async fn update_user(&self, id: Uuid, email: &str) -> Result<bool> {
        user_repository::update_email(&self.pool, id, email)
            .await
            .map_err(|err| unique_violation_as_conflict(err, email))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(user_repository::find_by_id(&self.pool, id).await?)
    }
}

fn unique_violation_as_conflict(err: sqlx::Error, email: &str) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Conflict(format!("email {} is already registered", email))
        }
        _ => RepositoryError::Database(err),
    }
}
