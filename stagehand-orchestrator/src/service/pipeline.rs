//! Pipeline Service
//!
//! Front door of the engine. Creates pipelines and users, resolves the live
//! orchestrator of a pipeline through the registry, and rebuilds it from the
//! repository when it has been evicted or the process restarted.

use serde_json::Value as JsonValue;
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::{Pipeline, PipelineStatus};
use stagehand_core::domain::stage::StageRecord;
use stagehand_core::domain::user::User;
use stagehand_core::dto::pipeline::{RollbackReport, RunReport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::StatusSink;
use crate::repository::PipelineRepository;
use crate::service::error::{ErrorKind, OrchestratorError, Result};
use crate::service::orchestrator::PipelineOrchestrator;
use crate::service::registry::OrchestratorRegistry;
use crate::stage::StageFactory;

pub struct PipelineService {
    repository: Arc<dyn PipelineRepository>,
    sink: Arc<dyn StatusSink>,
    factory: Arc<dyn StageFactory>,
    registry: OrchestratorRegistry,
}

impl PipelineService {
    pub fn new(
        repository: Arc<dyn PipelineRepository>,
        sink: Arc<dyn StatusSink>,
        factory: Arc<dyn StageFactory>,
        registry_capacity: usize,
    ) -> Self {
        Self {
            repository,
            sink,
            factory,
            registry: OrchestratorRegistry::new(registry_capacity),
        }
    }

    pub fn registry(&self) -> &OrchestratorRegistry {
        &self.registry
    }

    /// Create a pipeline with one `Pending` stage per name
    pub async fn create_pipeline(
        &self,
        user_id: Uuid,
        name: &str,
        stage_count: i32,
        stage_names: &[String],
    ) -> Result<Uuid> {
        validate_pipeline_request(name, stage_count, stage_names)?;

        self.repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("user {}", user_id)))?;

        let pipeline = Pipeline::new(user_id, name.trim());
        self.repository
            .save_pipeline_execution(&pipeline)
            .await
            .inspect_err(|e| error!("Failed to save pipeline: {}", e))?;

        let mut records = Vec::with_capacity(stage_names.len());
        for (position, stage_name) in stage_names.iter().enumerate() {
            let record = StageRecord::pending(pipeline.id, stage_name.trim(), position as i32);
            if let Err(err) = self.repository.save_stage(&record).await {
                error!("Failed to save stage {}: {}", stage_name, err);
                if let Err(cleanup) = self.repository.delete_pipeline(pipeline.id).await {
                    warn!(
                        "Failed to remove partially created pipeline {}: {}",
                        pipeline.id, cleanup
                    );
                }
                return Err(err.into());
            }
            records.push(record);
        }

        let orchestrator = self.build_orchestrator(pipeline.id, &records)?;
        self.registry.insert(orchestrator);

        info!(
            "Pipeline created: {} ({}) with {} stage(s)",
            pipeline.name,
            pipeline.id,
            records.len()
        );
        Ok(pipeline.id)
    }

    /// Run every stage of the pipeline and wait for the outcome
    pub async fn start_pipeline(
        &self,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: JsonValue,
    ) -> Result<RunReport> {
        info!("Starting pipeline: {} for user: {}", pipeline_id, user_id);
        let orchestrator = self.orchestrator(pipeline_id).await?;
        orchestrator.execute(user_id, input).await
    }

    /// Start a pipeline and let its stages finish in the background
    ///
    /// Start requests are validated and the pipeline is `Running` by the time
    /// this returns; the handle resolves to the run report.
    pub async fn launch_pipeline(
        &self,
        user_id: Uuid,
        pipeline_id: Uuid,
        input: JsonValue,
    ) -> Result<JoinHandle<Result<RunReport>>> {
        info!("Launching pipeline: {} for user: {}", pipeline_id, user_id);
        let orchestrator = self.orchestrator(pipeline_id).await?;
        let run = orchestrator.begin(user_id).await?;
        Ok(tokio::spawn(run.run(input)))
    }

    pub async fn get_pipeline_status(&self, pipeline_id: Uuid) -> Result<PipelineStatus> {
        debug!("Fetching status of pipeline: {}", pipeline_id);
        match self.registry.get(pipeline_id) {
            Some(orchestrator) => orchestrator.status().await,
            None => self
                .repository
                .get_pipeline_status(pipeline_id)
                .await?
                .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", pipeline_id))),
        }
    }

    /// Cancel a pipeline, marking it `Failed to Cancel` when the store refuses
    pub async fn cancel_pipeline(&self, pipeline_id: Uuid, user_id: Uuid) -> Result<()> {
        let orchestrator = self.orchestrator(pipeline_id).await?;
        match orchestrator.cancel(user_id).await {
            Err(err) if err.kind() == ErrorKind::Internal => {
                error!("Error cancelling pipeline {}: {}", pipeline_id, err);
                if let Err(mark) = self
                    .repository
                    .transition_pipeline_status(
                        pipeline_id,
                        &PipelineStatus::CancelFailed.predecessors(),
                        PipelineStatus::CancelFailed,
                    )
                    .await
                {
                    error!("Failed to mark pipeline {} as failed to cancel: {}", pipeline_id, mark);
                }
                Err(err)
            }
            other => other,
        }
    }

    pub async fn rollback_pipeline(
        &self,
        pipeline_id: Uuid,
        input: JsonValue,
    ) -> Result<RollbackReport> {
        info!("Rolling back pipeline: {}", pipeline_id);
        let orchestrator = self.orchestrator(pipeline_id).await?;
        orchestrator.rollback(input).await
    }

    pub async fn get_pipelines_by_user(&self, user_id: Uuid) -> Result<Vec<Pipeline>> {
        Ok(self.repository.get_pipelines_by_user(user_id).await?)
    }

    pub async fn get_pipeline_stages(&self, pipeline_id: Uuid) -> Result<Vec<StageRecord>> {
        self.ensure_pipeline(pipeline_id).await?;
        Ok(self.repository.get_pipeline_stages(pipeline_id).await?)
    }

    pub async fn get_execution_logs(&self, pipeline_id: Uuid) -> Result<Vec<ExecutionLog>> {
        self.ensure_pipeline(pipeline_id).await?;
        Ok(self.repository.get_execution_logs(pipeline_id).await?)
    }

    /// Remove a pipeline together with its stages and logs
    pub async fn delete_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        if let Some(orchestrator) = self.registry.get(pipeline_id) {
            if orchestrator.is_running() {
                return Err(OrchestratorError::conflict(format!(
                    "pipeline {} is running",
                    pipeline_id
                )));
            }
        }

        // The store refuses to delete a Running pipeline, which covers a start
        // racing this call
        if !self.repository.delete_pipeline(pipeline_id).await? {
            return Err(OrchestratorError::not_found(format!("pipeline {}", pipeline_id)));
        }
        self.registry.remove(pipeline_id);

        info!("Pipeline deleted: {}", pipeline_id);
        Ok(())
    }

    pub async fn register_user(&self, email: &str) -> Result<User> {
        let email = validate_email(email)?;
        let user = User::new(email);
        self.repository.save_user(&user).await?;

        info!("User registered: {} ({})", user.email, user.id);
        Ok(user)
    }

    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        self.repository
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("user {}", user_id)))
    }

    pub async fn update_user(&self, user_id: Uuid, email: &str) -> Result<User> {
        let email = validate_email(email)?;
        if !self.repository.update_user(user_id, email).await? {
            return Err(OrchestratorError::not_found(format!("user {}", user_id)));
        }

        info!("User updated: {}", user_id);
        self.get_user(user_id).await
    }

    /// Live orchestrator for a pipeline, rebuilt from the repository on a miss
    async fn orchestrator(&self, pipeline_id: Uuid) -> Result<Arc<PipelineOrchestrator>> {
        if let Some(orchestrator) = self.registry.get(pipeline_id) {
            return Ok(orchestrator);
        }

        self.ensure_pipeline(pipeline_id).await?;
        let records = self.repository.get_pipeline_stages(pipeline_id).await?;
        let orchestrator = self.build_orchestrator(pipeline_id, &records)?;
        debug!(
            "Rebuilt orchestrator for pipeline {} with {} stage(s)",
            pipeline_id,
            records.len()
        );

        Ok(self.registry.insert(orchestrator))
    }

    fn build_orchestrator(
        &self,
        pipeline_id: Uuid,
        records: &[StageRecord],
    ) -> Result<Arc<PipelineOrchestrator>> {
        let orchestrator = PipelineOrchestrator::new(
            pipeline_id,
            self.repository.clone(),
            self.sink.clone(),
        );
        for record in records {
            orchestrator.add_stage(self.factory.build(record))?;
        }
        Ok(Arc::new(orchestrator))
    }

    async fn ensure_pipeline(&self, pipeline_id: Uuid) -> Result<()> {
        self.repository
            .get_pipeline_by_id(pipeline_id)
            .await?
            .map(|_| ())
            .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", pipeline_id)))
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_pipeline_request(name: &str, stage_count: i32, stage_names: &[String]) -> Result<()> {
    if name.trim().is_empty() {
        return Err(OrchestratorError::invalid("pipeline name cannot be empty"));
    }

    if stage_count <= 0 {
        return Err(OrchestratorError::invalid(
            "pipeline must have at least one stage",
        ));
    }

    if stage_names.len() != stage_count as usize {
        return Err(OrchestratorError::invalid(format!(
            "expected {} stage names, got {}",
            stage_count,
            stage_names.len()
        )));
    }

    if stage_names.iter().any(|n| n.trim().is_empty()) {
        return Err(OrchestratorError::invalid("stage names cannot be empty"));
    }

    Ok(())
}

fn validate_email(email: &str) -> Result<&str> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(OrchestratorError::invalid(format!("invalid email: {}", email))),
    }
}
