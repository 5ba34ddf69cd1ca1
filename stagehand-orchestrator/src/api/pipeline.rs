//! Pipeline API Handlers
//!
//! HTTP endpoints for pipeline management and execution.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::pipeline::PipelineStatus;
use stagehand_core::domain::stage::StageRecord;
use stagehand_core::dto::pipeline::{
    CancelPipeline, CreatePipeline, PipelineCreated, PipelineStatusResponse, PipelineSummary,
    RollbackPipeline, RollbackReport, StartPipeline,
};
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /pipeline/create
pub async fn create_pipeline(
    State(state): State<AppState>,
    Json(req): Json<CreatePipeline>,
) -> ApiResult<(StatusCode, Json<PipelineCreated>)> {
    tracing::info!("Creating pipeline: {} for user: {}", req.name, req.user_id);

    let pipeline_id = state
        .service
        .create_pipeline(req.user_id, &req.name, req.stage_count, &req.stage_names)
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(PipelineCreated {
            message: "Pipeline created".to_string(),
            pipeline_id,
        }),
    ))
}

/// POST /pipeline/{id}/start
/// Start a pipeline; the run continues in the background once it is `Running`
pub async fn start_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StartPipeline>,
) -> ApiResult<(StatusCode, Json<PipelineStatusResponse>)> {
    let run = state.service.launch_pipeline(req.user_id, id, req.input).await?;
    tokio::spawn(async move {
        match run.await {
            Ok(Ok(report)) => tracing::info!("Pipeline {} run finished: {}", id, report.status),
            Ok(Err(e)) => tracing::error!("Pipeline {} run failed: {}", id, e),
            Err(e) => tracing::error!("Pipeline {} run task aborted: {}", id, e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(PipelineStatusResponse {
            pipeline_id: id,
            status: PipelineStatus::Running,
        }),
    ))
}

/// GET /pipeline/{id}/status
pub async fn get_pipeline_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PipelineStatusResponse>> {
    tracing::debug!("Getting status of pipeline: {}", id);

    let status = state.service.get_pipeline_status(id).await?;

    Ok(Json(PipelineStatusResponse {
        pipeline_id: id,
        status,
    }))
}

/// POST /pipeline/{id}/cancel
pub async fn cancel_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<CancelPipeline>,
) -> ApiResult<Json<PipelineStatusResponse>> {
    state.service.cancel_pipeline(id, req.user_id).await?;

    Ok(Json(PipelineStatusResponse {
        pipeline_id: id,
        status: PipelineStatus::Cancelled,
    }))
}

/// POST /pipeline/{id}/rollback
pub async fn rollback_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    req: Option<Json<RollbackPipeline>>,
) -> ApiResult<Json<RollbackReport>> {
    let Json(req) = req.unwrap_or_default();

    Ok(Json(state.service.rollback_pipeline(id, req.input).await?))
}

/// GET /pipeline/{id}/stages
pub async fn get_pipeline_stages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<StageRecord>>> {
    tracing::debug!("Getting stages of pipeline: {}", id);

    Ok(Json(state.service.get_pipeline_stages(id).await?))
}

/// GET /pipeline/{id}/logs
pub async fn get_execution_logs(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ExecutionLog>>> {
    tracing::debug!("Getting execution logs of pipeline: {}", id);

    Ok(Json(state.service.get_execution_logs(id).await?))
}

/// DELETE /pipeline/{id}
pub async fn delete_pipeline(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    tracing::info!("Deleting pipeline: {}", id);

    state.service.delete_pipeline(id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /pipeline/user/{user_id}
pub async fn list_user_pipelines(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<Vec<PipelineSummary>>> {
    tracing::debug!("Listing pipelines of user: {}", user_id);

    let pipelines = state.service.get_pipelines_by_user(user_id).await?;

    Ok(Json(pipelines.into_iter().map(Into::into).collect()))
}
