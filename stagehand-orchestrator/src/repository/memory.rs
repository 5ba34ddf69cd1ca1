//! In-memory implementation of [`PipelineRepository`]
//!
//! Keeps every record in process memory behind a single lock. Used by the test
//! suite and by `STORAGE_BACKEND=memory` deployments, where state is lost on
//! restart.

use async_trait::async_trait;
use parking_lot::RwLock;
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::{Pipeline, PipelineStatus};
use stagehand_core::domain::stage::{StageRecord, StageStatus};
use stagehand_core::domain::user::User;
use std::collections::HashMap;
use uuid::Uuid;

use super::{PipelineRepository, RepositoryError, Result};

#[derive(Default)]
struct State {
    users: HashMap<Uuid, User>,
    pipelines: HashMap<Uuid, Pipeline>,
    stages: HashMap<Uuid, StageRecord>,
    logs: Vec<ExecutionLog>,
}

#[derive(Default)]
pub struct InMemoryPipelineRepository {
    state: RwLock<State>,
    #[cfg(test)]
    faults: parking_lot::Mutex<Faults>,
}

#[cfg(test)]
#[derive(Default)]
struct Faults {
    all_status_writes: bool,
    next_transition_to: Option<PipelineStatus>,
}

impl InMemoryPipelineRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every pipeline status write fail with a database error
    #[cfg(test)]
    pub fn fail_status_writes(&self, fail: bool) {
        self.faults.lock().all_status_writes = fail;
    }

    /// Make only the next status write to `status` fail with a database error
    #[cfg(test)]
    pub fn fail_next_transition_to(&self, status: PipelineStatus) {
        self.faults.lock().next_transition_to = Some(status);
    }

    #[cfg_attr(not(test), allow(unused_variables))]
    fn check_status_write(&self, to: PipelineStatus) -> Result<()> {
        #[cfg(test)]
        {
            let mut faults = self.faults.lock();
            if faults.all_status_writes || faults.next_transition_to.take_if(|s| *s == to).is_some()
            {
                return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PipelineRepository for InMemoryPipelineRepository {
    async fn save_pipeline_execution(&self, pipeline: &Pipeline) -> Result<()> {
        let mut state = self.state.write();
        if state.pipelines.contains_key(&pipeline.id) {
            return Err(RepositoryError::Conflict(format!(
                "pipeline {} already exists",
                pipeline.id
            )));
        }
        state.pipelines.insert(pipeline.id, pipeline.clone());
        Ok(())
    }

    async fn transition_pipeline_status(
        &self,
        id: Uuid,
        from: &[PipelineStatus],
        to: PipelineStatus,
    ) -> Result<bool> {
        self.check_status_write(to)?;
        let mut state = self.state.write();
        let pipeline = state
            .pipelines
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("pipeline {}", id)))?;

        if !from.contains(&pipeline.status) {
            return Ok(false);
        }
        pipeline.status = to;
        pipeline.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn get_pipeline_status(&self, id: Uuid) -> Result<Option<PipelineStatus>> {
        Ok(self.state.read().pipelines.get(&id).map(|p| p.status))
    }

    async fn get_pipeline_by_id(&self, id: Uuid) -> Result<Option<Pipeline>> {
        Ok(self.state.read().pipelines.get(&id).cloned())
    }

    async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<Pipeline>> {
        let state = self.state.read();
        let mut pipelines: Vec<Pipeline> = state
            .pipelines
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        pipelines.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pipelines)
    }

    async fn delete_pipeline(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write();
        match state.pipelines.get(&id) {
            None => return Ok(false),
            Some(pipeline) if pipeline.status == PipelineStatus::Running => {
                return Err(RepositoryError::Conflict(format!(
                    "pipeline {} is {}",
                    id, pipeline.status
                )));
            }
            Some(_) => {
                state.pipelines.remove(&id);
            }
        }
        state.stages.retain(|_, stage| stage.pipeline_id != id);
        state.logs.retain(|entry| entry.pipeline_id != id);
        Ok(true)
    }

    async fn save_stage(&self, stage: &StageRecord) -> Result<()> {
        let mut state = self.state.write();
        if !state.pipelines.contains_key(&stage.pipeline_id) {
            return Err(RepositoryError::NotFound(format!(
                "pipeline {}",
                stage.pipeline_id
            )));
        }
        state.stages.insert(stage.id, stage.clone());
        Ok(())
    }

    async fn update_stage_status(
        &self,
        stage_id: Uuid,
        status: StageStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let mut state = self.state.write();
        let stage = state
            .stages
            .get_mut(&stage_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("stage {}", stage_id)))?;

        if stage.status.is_terminal() {
            return Ok(false);
        }
        stage.status = status;
        stage.error_message = error_message.map(str::to_string);
        stage.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<StageRecord>> {
        let state = self.state.read();
        let mut stages: Vec<StageRecord> = state
            .stages
            .values()
            .filter(|s| s.pipeline_id == pipeline_id)
            .cloned()
            .collect();
        stages.sort_by_key(|s| s.position);
        Ok(stages)
    }

    async fn save_execution_log(&self, entry: &ExecutionLog) -> Result<()> {
        self.state.write().logs.push(entry.clone());
        Ok(())
    }

    async fn get_execution_logs(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLog>> {
        Ok(self
            .state
            .read()
            .logs
            .iter()
            .filter(|entry| entry.pipeline_id == pipeline_id)
            .cloned()
            .collect())
    }

    async fn save_user(&self, user: &User) -> Result<()> {
        let mut state = self.state.write();
        if state.users.values().any(|u| u.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                user.email
            )));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, id: Uuid, email: &str) -> Result<bool> {
        let mut state = self.state.write();
        if state.users.values().any(|u| u.id != id && u.email == email) {
            return Err(RepositoryError::Conflict(format!(
                "email {} is already registered",
                email
            )));
        }
        match state.users.get_mut(&id) {
            Some(user) => {
                user.email = email.to_string();
                user.updated_at = chrono::Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.state.read().users.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> (InMemoryPipelineRepository, Pipeline) {
        let repo = InMemoryPipelineRepository::new();
        let user = User::new("ops@example.com");
        repo.save_user(&user).await.unwrap();
        let pipeline = Pipeline::new(user.id, "nightly");
        repo.save_pipeline_execution(&pipeline).await.unwrap();
        (repo, pipeline)
    }

    #[tokio::test]
    async fn test_transition_only_applies_from_allowed_states() {
        let (repo, pipeline) = seeded().await;

        let applied = repo
            .transition_pipeline_status(
                pipeline.id,
                &[PipelineStatus::Running],
                PipelineStatus::Completed,
            )
            .await
            .unwrap();
        assert!(!applied);

        let applied = repo
            .transition_pipeline_status(
                pipeline.id,
                &PipelineStatus::STARTABLE,
                PipelineStatus::Running,
            )
            .await
            .unwrap();
        assert!(applied);
        assert_eq!(
            repo.get_pipeline_status(pipeline.id).await.unwrap(),
            Some(PipelineStatus::Running)
        );
    }

    #[tokio::test]
    async fn test_transition_on_missing_pipeline_is_not_found() {
        let repo = InMemoryPipelineRepository::new();
        let result = repo
            .transition_pipeline_status(
                Uuid::new_v4(),
                &PipelineStatus::STARTABLE,
                PipelineStatus::Running,
            )
            .await;
        assert!(matches!(result, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_stage_is_not_rewritten() {
        let (repo, pipeline) = seeded().await;
        let stage = StageRecord::pending(pipeline.id, "fetch", 0);
        repo.save_stage(&stage).await.unwrap();

        assert!(
            repo.update_stage_status(stage.id, StageStatus::Completed, None)
                .await
                .unwrap()
        );
        assert!(
            !repo
                .update_stage_status(stage.id, StageStatus::Failed, Some("cancelled"))
                .await
                .unwrap()
        );

        let stages = repo.get_pipeline_stages(pipeline.id).await.unwrap();
        assert_eq!(stages[0].status, StageStatus::Completed);
        assert!(stages[0].error_message.is_none());
    }

    #[tokio::test]
    async fn test_stages_come_back_in_position_order() {
        let (repo, pipeline) = seeded().await;
        for (position, name) in ["load", "fetch", "transform"].iter().enumerate().rev() {
            let stage = StageRecord::pending(pipeline.id, *name, position as i32);
            repo.save_stage(&stage).await.unwrap();
        }

        let names: Vec<String> = repo
            .get_pipeline_stages(pipeline.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["load", "fetch", "transform"]);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (repo, _) = seeded().await;
        let result = repo.save_user(&User::new("ops@example.com")).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_stages_and_logs() {
        let (repo, pipeline) = seeded().await;
        let stage = StageRecord::pending(pipeline.id, "fetch", 0);
        repo.save_stage(&stage).await.unwrap();
        repo.save_execution_log(&ExecutionLog::completed(pipeline.id, stage.id, "fetch"))
            .await
            .unwrap();

        assert!(repo.delete_pipeline(pipeline.id).await.unwrap());
        assert!(repo.get_pipeline_stages(pipeline.id).await.unwrap().is_empty());
        assert!(repo.get_execution_logs(pipeline.id).await.unwrap().is_empty());
        assert!(!repo.delete_pipeline(pipeline.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_running_pipeline_is_not_deleted() {
        let (repo, pipeline) = seeded().await;
        repo.transition_pipeline_status(
            pipeline.id,
            &PipelineStatus::STARTABLE,
            PipelineStatus::Running,
        )
        .await
        .unwrap();

        let result = repo.delete_pipeline(pipeline.id).await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        assert!(repo.get_pipeline_by_id(pipeline.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_one_shot_fault_only_hits_its_target() {
        let (repo, pipeline) = seeded().await;
        repo.fail_next_transition_to(PipelineStatus::Cancelled);

        let started = repo
            .transition_pipeline_status(
                pipeline.id,
                &PipelineStatus::STARTABLE,
                PipelineStatus::Running,
            )
            .await;
        assert!(started.unwrap());

        let cancelled = repo
            .transition_pipeline_status(
                pipeline.id,
                &PipelineStatus::CANCELLABLE,
                PipelineStatus::Cancelled,
            )
            .await;
        assert!(matches!(cancelled, Err(RepositoryError::Database(_))));

        let retried = repo
            .transition_pipeline_status(
                pipeline.id,
                &PipelineStatus::CANCELLABLE,
                PipelineStatus::Cancelled,
            )
            .await;
        assert!(retried.unwrap());
    }
}
