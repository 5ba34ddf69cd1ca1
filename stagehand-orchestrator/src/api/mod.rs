//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod events;
pub mod health;
pub mod pipeline;
pub mod user;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::events::BroadcastSink;
use crate::service::PipelineService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PipelineService>,
    pub events: BroadcastSink,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // User endpoints
        .route("/user/register", post(user::register_user))
        .route("/user/{id}", get(user::get_user).put(user::update_user))
        // Pipeline endpoints
        .route("/pipeline/create", post(pipeline::create_pipeline))
        .route("/pipeline/{id}", delete(pipeline::delete_pipeline))
        .route("/pipeline/{id}/start", post(pipeline::start_pipeline))
        .route("/pipeline/{id}/status", get(pipeline::get_pipeline_status))
        .route("/pipeline/{id}/cancel", post(pipeline::cancel_pipeline))
        .route("/pipeline/{id}/rollback", post(pipeline::rollback_pipeline))
        .route("/pipeline/{id}/stages", get(pipeline::get_pipeline_stages))
        .route("/pipeline/{id}/logs", get(pipeline::get_execution_logs))
        .route(
            "/pipeline/user/{user_id}",
            get(pipeline::list_user_pipelines),
        )
        // Live status stream
        .route("/events", get(events::status_events))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
