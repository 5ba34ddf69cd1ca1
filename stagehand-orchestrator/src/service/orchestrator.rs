//! Pipeline Orchestrator
//!
//! Runs the stage set of exactly one pipeline. A run fans every stage out to
//! its own tokio task, waits for all of them, and settles the pipeline on
//! `Completed` or `Failed`. Every stage outcome is persisted before it is
//! announced to the status sink.
//!
//! Cancellation is cooperative: `cancel` persists `Cancelled` first and then
//! fires the run's cancellation token. Once `Cancelled` is persisted the final
//! status write of the run is dropped, while stage records are still written.

use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use stagehand_core::domain::event::StatusEvent;
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::PipelineStatus;
use stagehand_core::domain::stage::StageStatus;
use stagehand_core::dto::pipeline::{RollbackReport, RunReport, StageFailure};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::events::StatusSink;
use crate::repository::PipelineRepository;
use crate::service::error::{OrchestratorError, Result};
use crate::stage::{Stage, StageContext, StageError};

pub struct PipelineOrchestrator {
    pipeline_id: Uuid,
    repository: Arc<dyn PipelineRepository>,
    sink: Arc<dyn StatusSink>,
    stages: Mutex<Vec<Arc<dyn Stage>>>,
    /// Cancellation token of the run in flight, if any
    run: Mutex<Option<CancellationToken>>,
}

impl PipelineOrchestrator {
    pub fn new(
        pipeline_id: Uuid,
        repository: Arc<dyn PipelineRepository>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            pipeline_id,
            repository,
            sink,
            stages: Mutex::new(Vec::new()),
            run: Mutex::new(None),
        }
    }

    pub fn pipeline_id(&self) -> Uuid {
        self.pipeline_id
    }

    pub fn stage_count(&self) -> usize {
        self.stages.lock().len()
    }

    /// Whether a run is currently in flight
    pub fn is_running(&self) -> bool {
        self.run.lock().is_some()
    }

    /// Append a stage to the pipeline
    pub fn add_stage(&self, stage: Arc<dyn Stage>) -> Result<()> {
        if stage.id().is_nil() {
            return Err(OrchestratorError::invalid("stage id cannot be nil"));
        }
        if stage.name().trim().is_empty() {
            return Err(OrchestratorError::invalid("stage name cannot be empty"));
        }

        let mut stages = self.stages.lock();
        if stages.iter().any(|s| s.id() == stage.id()) {
            return Err(OrchestratorError::invalid(format!(
                "stage {} is already part of pipeline {}",
                stage.id(),
                self.pipeline_id
            )));
        }
        stages.push(stage);
        Ok(())
    }

    /// Run every stage of the pipeline concurrently and wait for all of them
    ///
    /// Stage failures never abort siblings; they are collected in the report
    /// and turn the pipeline `Failed`.
    pub async fn execute(self: &Arc<Self>, user_id: Uuid, input: JsonValue) -> Result<RunReport> {
        self.begin(user_id).await?.run(input).await
    }

    /// Validate a start request and move the pipeline to `Running`
    ///
    /// Every rejection (unknown user or pipeline, no stages, a run already in
    /// flight, a pipeline that is not startable) happens here, before any stage
    /// is spawned. The returned run holds the run slot until it is dropped.
    pub async fn begin(self: &Arc<Self>, user_id: Uuid) -> Result<PipelineRun> {
        let pipeline_id = self.pipeline_id;

        self.repository
            .get_user_by_id(user_id)
            .await
            .inspect_err(|e| error!("Failed to validate user existence: {}", e))?
            .ok_or_else(|| OrchestratorError::not_found(format!("user {}", user_id)))?;

        let pipeline = self
            .repository
            .get_pipeline_by_id(pipeline_id)
            .await
            .inspect_err(|e| error!("Failed to fetch pipeline details: {}", e))?
            .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", pipeline_id)))?;

        let stages: Vec<Arc<dyn Stage>> = self.stages.lock().clone();
        if stages.is_empty() {
            return Err(OrchestratorError::invalid(format!(
                "pipeline {} has no stages",
                pipeline_id
            )));
        }

        let token = CancellationToken::new();
        {
            let mut run = self.run.lock();
            if run.is_some() {
                return Err(OrchestratorError::conflict(format!(
                    "pipeline {} is already running",
                    pipeline_id
                )));
            }
            *run = Some(token.clone());
        }
        let run = PipelineRun {
            orchestrator: self.clone(),
            pipeline_name: pipeline.name,
            stages,
            token,
        };

        let started = self
            .repository
            .transition_pipeline_status(
                pipeline_id,
                &PipelineStatus::Running.predecessors(),
                PipelineStatus::Running,
            )
            .await
            .inspect_err(|e| error!("Failed to update pipeline execution status: {}", e))?;
        if !started {
            let current = self.current_status().await?;
            return Err(OrchestratorError::conflict(format!(
                "pipeline {} cannot be started while {}",
                pipeline_id, current
            )));
        }

        info!(
            "Pipeline {} ({}) running {} stage(s)",
            run.pipeline_name,
            pipeline_id,
            run.stages.len()
        );
        self.sink.notify(StatusEvent::pipeline(
            pipeline_id,
            &run.pipeline_name,
            PipelineStatus::Running,
        ));

        Ok(run)
    }

    /// Current persisted status of the pipeline
    pub async fn status(&self) -> Result<PipelineStatus> {
        self.current_status().await
    }

    /// Cancel the pipeline
    ///
    /// Fails with `Conflict` once the pipeline has finished. In-flight stages
    /// are signalled to stop; those that already finished keep their status.
    pub async fn cancel(&self, user_id: Uuid) -> Result<()> {
        let pipeline_id = self.pipeline_id;
        info!("Cancelling pipeline: {} for user: {}", pipeline_id, user_id);

        let pipeline = self
            .repository
            .get_pipeline_by_id(pipeline_id)
            .await
            .inspect_err(|e| error!("Error fetching pipeline status: {}", e))?
            .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", pipeline_id)))?;

        if !pipeline.status.can_cancel() {
            warn!(
                "Pipeline {} is already {}, cannot cancel",
                pipeline_id, pipeline.status
            );
            return Err(OrchestratorError::conflict(format!(
                "cannot cancel a {} pipeline",
                pipeline.status
            )));
        }

        let applied = self
            .repository
            .transition_pipeline_status(
                pipeline_id,
                &PipelineStatus::Cancelled.predecessors(),
                PipelineStatus::Cancelled,
            )
            .await
            .inspect_err(|e| error!("Failed to update pipeline status: {}", e))?;
        if !applied {
            let current = self.current_status().await?;
            return Err(OrchestratorError::conflict(format!(
                "cannot cancel a {} pipeline",
                current
            )));
        }

        if let Some(token) = self.run.lock().as_ref() {
            token.cancel();
        }

        self.sink.notify(StatusEvent::pipeline(
            pipeline_id,
            &pipeline.name,
            PipelineStatus::Cancelled,
        ));
        info!("Pipeline {} successfully cancelled", pipeline_id);
        Ok(())
    }

    /// Run every stage's compensation, last stage first
    ///
    /// Only allowed once the pipeline failed or was cancelled and no run is in
    /// flight. Rollback failures are collected, never raised.
    pub async fn rollback(&self, input: JsonValue) -> Result<RollbackReport> {
        let pipeline_id = self.pipeline_id;
        let pipeline = self
            .repository
            .get_pipeline_by_id(pipeline_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", pipeline_id)))?;

        if !PipelineStatus::ROLLBACKABLE.contains(&pipeline.status) {
            return Err(OrchestratorError::conflict(format!(
                "cannot roll back a {} pipeline",
                pipeline.status
            )));
        }
        if self.is_running() {
            return Err(OrchestratorError::conflict(format!(
                "pipeline {} still has stages winding down",
                pipeline_id
            )));
        }

        let stages: Vec<Arc<dyn Stage>> = self.stages.lock().clone();
        let ctx = StageContext::new(pipeline_id, &pipeline.name);
        let mut failures = Vec::new();
        for stage in stages.iter().rev() {
            if let Err(err) = stage.rollback(&ctx, &input).await {
                warn!("Rollback of stage {} failed: {}", stage.name(), err);
                failures.push(StageFailure {
                    stage_id: stage.id(),
                    stage_name: stage.name().to_string(),
                    message: err.to_string(),
                });
            }
        }

        info!(
            "Rolled back pipeline {} ({} of {} stages clean)",
            pipeline_id,
            stages.len() - failures.len(),
            stages.len()
        );

        Ok(RollbackReport {
            pipeline_id,
            rolled_back: stages.len() - failures.len(),
            failures,
        })
    }

    async fn current_status(&self) -> Result<PipelineStatus> {
        self.repository
            .get_pipeline_status(self.pipeline_id)
            .await?
            .ok_or_else(|| OrchestratorError::not_found(format!("pipeline {}", self.pipeline_id)))
    }

    /// Persist and announce a stage whose task panicked or was aborted
    async fn record_aborted_stage(
        &self,
        pipeline_name: &str,
        stage_id: Uuid,
        stage_name: String,
    ) -> StageFailure {
        let message = "stage task aborted".to_string();
        if !stage_id.is_nil() {
            persist_outcome(
                self.repository.as_ref(),
                ExecutionLog::failed(self.pipeline_id, stage_id, &stage_name, message.clone()),
            )
            .await;
        }
        self.sink.notify(StatusEvent::stage(
            self.pipeline_id,
            pipeline_name,
            &stage_name,
            StageStatus::Failed,
        ));

        StageFailure {
            stage_id,
            stage_name,
            message,
        }
    }
}

/// A started run of one pipeline
///
/// Holds the orchestrator's run slot; dropping it, finished or not, frees the
/// slot for the next start.
pub struct PipelineRun {
    orchestrator: Arc<PipelineOrchestrator>,
    pipeline_name: String,
    stages: Vec<Arc<dyn Stage>>,
    token: CancellationToken,
}

impl PipelineRun {
    /// Fan the stages out, wait for all of them and settle the pipeline
    pub async fn run(self, input: JsonValue) -> Result<RunReport> {
        let orchestrator = self.orchestrator.clone();
        let pipeline_id = orchestrator.pipeline_id;

        let run_ctx =
            StageContext::with_cancellation(pipeline_id, &self.pipeline_name, self.token.clone());
        let mut tasks = JoinSet::new();
        let mut spawned = HashMap::new();
        for stage in &self.stages {
            let identity = (stage.id(), stage.name().to_string());
            let handle = tasks.spawn(run_stage(
                stage.clone(),
                run_ctx.child(),
                input.clone(),
                orchestrator.repository.clone(),
                orchestrator.sink.clone(),
            ));
            spawned.insert(handle.id(), identity);
        }

        let mut results = Vec::new();
        let mut failures = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, Ok(output))) => results.push(output),
                Ok((_, Err(failure))) => failures.push(failure),
                Err(err) => {
                    let (stage_id, stage_name) = spawned
                        .remove(&err.id())
                        .unwrap_or_else(|| (Uuid::nil(), "unknown".to_string()));
                    error!("Stage {} task aborted: {}", stage_name, err);
                    failures.push(
                        orchestrator
                            .record_aborted_stage(&self.pipeline_name, stage_id, stage_name)
                            .await,
                    );
                }
            }
        }

        let final_status = if failures.is_empty() {
            PipelineStatus::Completed
        } else {
            PipelineStatus::Failed
        };

        // A failed cancel leaves the outcome to the run
        let applied = orchestrator
            .repository
            .transition_pipeline_status(pipeline_id, &final_status.predecessors(), final_status)
            .await
            .inspect_err(|e| error!("Failed to update final pipeline execution status: {}", e))?;

        let status = if applied {
            orchestrator.sink.notify(StatusEvent::pipeline(
                pipeline_id,
                &self.pipeline_name,
                final_status,
            ));
            final_status
        } else {
            let current = orchestrator.current_status().await?;
            info!(
                "Pipeline {} became {} while running, keeping it over {}",
                pipeline_id, current, final_status
            );
            current
        };

        info!(
            "Pipeline {} finished: {} ({} completed, {} failed)",
            pipeline_id,
            status,
            results.len(),
            failures.len()
        );

        Ok(RunReport {
            pipeline_id,
            status,
            results,
            failures,
        })
    }
}

impl Drop for PipelineRun {
    fn drop(&mut self) {
        self.orchestrator.run.lock().take();
    }
}

/// Execute one stage and record its outcome
async fn run_stage(
    stage: Arc<dyn Stage>,
    ctx: StageContext,
    input: JsonValue,
    repository: Arc<dyn PipelineRepository>,
    sink: Arc<dyn StatusSink>,
) -> std::result::Result<JsonValue, StageFailure> {
    let stage_id = stage.id();
    let stage_name = stage.name().to_string();

    if let Err(err) = repository
        .update_stage_status(stage_id, StageStatus::Running, None)
        .await
    {
        warn!("Failed to mark stage {} running: {}", stage_name, err);
    }
    sink.notify(StatusEvent::stage(
        ctx.pipeline_id,
        &ctx.pipeline_name,
        &stage_name,
        StageStatus::Running,
    ));

    let outcome = match stage.execute(&ctx, &input).await {
        Ok(output) => Ok(output),
        Err(err) => Err(stage.handle_error(&ctx, err).await),
    };

    let entry = match &outcome {
        Ok(_) => ExecutionLog::completed(ctx.pipeline_id, stage_id, &stage_name),
        Err(err) => ExecutionLog::failed(ctx.pipeline_id, stage_id, &stage_name, err.to_string()),
    };
    let status = entry.status;
    persist_outcome(repository.as_ref(), entry).await;

    sink.notify(StatusEvent::stage(
        ctx.pipeline_id,
        &ctx.pipeline_name,
        &stage_name,
        status,
    ));

    match outcome {
        Ok(output) => {
            debug!("Stage {} completed", stage_name);
            Ok(output)
        }
        Err(err) => {
            if err == StageError::Cancelled {
                info!("Stage {} stopped by cancellation", stage_name);
            } else {
                warn!("Stage {} failed: {}", stage_name, err);
            }
            Err(StageFailure {
                stage_id,
                stage_name,
                message: err.to_string(),
            })
        }
    }
}

/// Write the execution log entry and the terminal stage status
///
/// Failures are logged; one stage's bookkeeping never fails its siblings.
async fn persist_outcome(repository: &dyn PipelineRepository, entry: ExecutionLog) {
    if let Err(err) = repository.save_execution_log(&entry).await {
        error!("Failed to save execution log: {}", err);
    }
    if let Err(err) = repository
        .update_stage_status(entry.stage_id, entry.status, entry.error_message.as_deref())
        .await
    {
        error!(
            "Failed to update stage {} to {}: {}",
            entry.stage_name, entry.status, err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryPipelineRepository;
    use crate::service::error::ErrorKind;
    use crate::testing::{RecordingSink, ScriptedStage, seed_pipeline};
    use serde_json::json;
    use std::time::Duration;

    struct Fixture {
        repo: Arc<InMemoryPipelineRepository>,
        sink: Arc<RecordingSink>,
        orchestrator: Arc<PipelineOrchestrator>,
        user_id: Uuid,
    }

    async fn fixture(stages: Vec<ScriptedStage>) -> Fixture {
        let repo = Arc::new(InMemoryPipelineRepository::new());
        let sink = Arc::new(RecordingSink::default());
        let names: Vec<&str> = stages.iter().map(|s| s.name()).collect();
        let (user_id, pipeline_id, records) = seed_pipeline(repo.as_ref(), "etl", &names).await;

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            pipeline_id,
            repo.clone(),
            sink.clone(),
        ));
        for (stage, record) in stages.into_iter().zip(records) {
            orchestrator
                .add_stage(Arc::new(stage.with_id(record.id)))
                .unwrap();
        }

        Fixture {
            repo,
            sink,
            orchestrator,
            user_id,
        }
    }

    #[tokio::test]
    async fn test_add_stage_rejects_nil_blank_and_duplicate() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;

        let nil = fx
            .orchestrator
            .add_stage(Arc::new(ScriptedStage::ok("x").with_id(Uuid::nil())));
        assert_eq!(nil.unwrap_err().kind(), ErrorKind::InvalidArgument);

        let blank = fx.orchestrator.add_stage(Arc::new(ScriptedStage::ok("  ")));
        assert_eq!(blank.unwrap_err().kind(), ErrorKind::InvalidArgument);

        let stage = ScriptedStage::ok("load");
        let id = stage.id();
        fx.orchestrator.add_stage(Arc::new(stage)).unwrap();
        let duplicate = fx
            .orchestrator
            .add_stage(Arc::new(ScriptedStage::ok("load-again").with_id(id)));
        assert_eq!(duplicate.unwrap_err().kind(), ErrorKind::InvalidArgument);
        assert_eq!(fx.orchestrator.stage_count(), 2);
    }

    #[tokio::test]
    async fn test_execute_completes_all_stages() {
        let fx = fixture(vec![
            ScriptedStage::ok("fetch"),
            ScriptedStage::ok("transform"),
            ScriptedStage::ok("load"),
        ])
        .await;

        let report = fx
            .orchestrator
            .execute(fx.user_id, json!({"k": "v"}))
            .await
            .unwrap();

        assert_eq!(report.status, PipelineStatus::Completed);
        assert_eq!(report.results.len(), 3);
        assert!(report.error().is_none());
        assert!(!fx.orchestrator.is_running());

        let stages = fx
            .repo
            .get_pipeline_stages(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        assert!(stages.iter().all(|s| s.status == StageStatus::Completed));

        let logs = fx
            .repo
            .get_execution_logs(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        assert_eq!(logs.len(), 3);
    }

    #[tokio::test]
    async fn test_execute_emits_running_before_terminal_per_stage() {
        let fx = fixture(vec![ScriptedStage::ok("fetch"), ScriptedStage::ok("load")]).await;
        fx.orchestrator.execute(fx.user_id, json!(null)).await.unwrap();

        let events = fx.sink.events();
        for stage in ["fetch", "load"] {
            let statuses: Vec<&str> = events
                .iter()
                .filter(|e| e.stage_name.as_deref() == Some(stage))
                .map(|e| e.status.as_str())
                .collect();
            assert_eq!(statuses, vec!["Running", "Completed"]);
        }

        let pipeline_events: Vec<&str> = events
            .iter()
            .filter(|e| e.stage_name.is_none())
            .map(|e| e.status.as_str())
            .collect();
        assert_eq!(pipeline_events, vec!["Running", "Completed"]);
    }

    #[tokio::test]
    async fn test_failing_stage_does_not_stop_siblings() {
        let fx = fixture(vec![
            ScriptedStage::ok("fetch").with_delay(Duration::from_millis(30)),
            ScriptedStage::failing("transform", "bad row"),
            ScriptedStage::ok("load").with_delay(Duration::from_millis(30)),
        ])
        .await;

        let report = fx.orchestrator.execute(fx.user_id, json!({})).await.unwrap();

        assert_eq!(report.status, PipelineStatus::Failed);
        assert_eq!(report.results.len(), 2);
        let error = report.error().unwrap();
        assert_eq!(error.stage_name, "transform");
        assert_eq!(error.message, "bad row");

        let stages = fx
            .repo
            .get_pipeline_stages(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        let transform = stages.iter().find(|s| s.name == "transform").unwrap();
        assert_eq!(transform.status, StageStatus::Failed);
        assert_eq!(transform.error_message.as_deref(), Some("bad row"));
        assert_eq!(
            stages
                .iter()
                .filter(|s| s.status == StageStatus::Completed)
                .count(),
            2
        );
    }

    #[tokio::test]
    async fn test_panicking_stage_counts_as_failure() {
        let fx = fixture(vec![ScriptedStage::ok("fetch"), ScriptedStage::panicking("load")]).await;

        let report = fx.orchestrator.execute(fx.user_id, json!({})).await.unwrap();

        assert_eq!(report.status, PipelineStatus::Failed);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage_name, "load");

        let stages = fx
            .repo
            .get_pipeline_stages(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        assert!(stages.iter().all(|s| s.status.is_terminal()));
    }

    #[tokio::test]
    async fn test_execute_unknown_user_is_not_found() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;

        let err = fx
            .orchestrator
            .execute(Uuid::new_v4(), json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            fx.orchestrator.status().await.unwrap(),
            PipelineStatus::Created
        );
    }

    #[tokio::test]
    async fn test_execute_twice_is_conflict() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;
        fx.orchestrator.execute(fx.user_id, json!({})).await.unwrap();

        let err = fx
            .orchestrator
            .execute(fx.user_id, json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            fx.orchestrator.status().await.unwrap(),
            PipelineStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_status_write_failure_is_surfaced() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;
        fx.repo.fail_status_writes(true);

        let err = fx
            .orchestrator
            .execute(fx.user_id, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!fx.orchestrator.is_running());
        assert_eq!(
            fx.orchestrator.status().await.unwrap(),
            PipelineStatus::Created
        );
    }

    #[tokio::test]
    async fn test_cancel_mid_run_is_sticky() {
        let fx = fixture(vec![
            ScriptedStage::ok("fetch"),
            ScriptedStage::until_cancelled("transform"),
        ])
        .await;

        let orchestrator = fx.orchestrator.clone();
        let user_id = fx.user_id;
        let run = tokio::spawn(async move { orchestrator.execute(user_id, json!({})).await });

        while !fx.sink.saw_stage("transform", "Running") {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        fx.orchestrator.cancel(fx.user_id).await.unwrap();

        let report = run.await.unwrap().unwrap();
        assert_eq!(report.status, PipelineStatus::Cancelled);
        assert_eq!(
            fx.orchestrator.status().await.unwrap(),
            PipelineStatus::Cancelled
        );

        let stages = fx
            .repo
            .get_pipeline_stages(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        let fetch = stages.iter().find(|s| s.name == "fetch").unwrap();
        let transform = stages.iter().find(|s| s.name == "transform").unwrap();
        assert_eq!(fetch.status, StageStatus::Completed);
        assert_eq!(transform.status, StageStatus::Failed);
        assert_eq!(transform.error_message.as_deref(), Some("cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_completed_is_conflict() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;
        fx.orchestrator.execute(fx.user_id, json!({})).await.unwrap();

        let err = fx.orchestrator.cancel(fx.user_id).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(
            fx.orchestrator.status().await.unwrap(),
            PipelineStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_cancel_before_start_blocks_execution() {
        let fx = fixture(vec![ScriptedStage::ok("fetch")]).await;
        fx.orchestrator.cancel(fx.user_id).await.unwrap();

        let err = fx
            .orchestrator
            .execute(fx.user_id, json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let stages = fx
            .repo
            .get_pipeline_stages(fx.orchestrator.pipeline_id())
            .await
            .unwrap();
        assert_eq!(stages[0].status, StageStatus::Pending);
    }

    #[tokio::test]
    async fn test_rollback_runs_in_reverse_after_failure() {
        let fx = fixture(vec![
            ScriptedStage::ok("fetch"),
            ScriptedStage::failing("transform", "bad row"),
            ScriptedStage::ok("load").with_failing_rollback(),
        ])
        .await;

        let early = fx.orchestrator.rollback(json!({})).await.unwrap_err();
        assert_eq!(early.kind(), ErrorKind::Conflict);

        fx.orchestrator.execute(fx.user_id, json!({})).await.unwrap();
        let report = fx.orchestrator.rollback(json!({})).await.unwrap();

        assert_eq!(report.rolled_back, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].stage_name, "load");
    }
}
