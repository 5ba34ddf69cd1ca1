//! Stagehand Orchestrator
//!
//! Runs user-owned pipelines whose stages execute concurrently, persists every
//! status transition and streams live status events to subscribers.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Repositories: Postgres or in-memory persistence behind one trait
//! - Services: Per-pipeline orchestrators, the registry and the pipeline service
//! - Events: Status sinks fanned out to WebSocket subscribers and the log
//! - API: axum HTTP endpoints

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod repository;
pub mod service;
pub mod stage;
#[cfg(test)]
mod testing;

use crate::config::{Config, StorageBackend};
use crate::events::{BroadcastSink, FanoutSink, TracingSink};
use crate::repository::{InMemoryPipelineRepository, PgPipelineRepository, PipelineRepository};
use crate::service::PipelineService;
use crate::stage::BasicStageFactory;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stagehand_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Stagehand Orchestrator...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let repository = create_repository(&config).await?;

    let events = BroadcastSink::new(config.event_channel_capacity);
    let sink = FanoutSink::new()
        .with(Arc::new(events.clone()))
        .with(Arc::new(TracingSink));

    let service = Arc::new(PipelineService::new(
        repository,
        Arc::new(sink),
        Arc::new(BasicStageFactory::new(config.stage_work)),
        config.registry_capacity,
    ));

    // Build router with all API endpoints
    let app = api::create_router(api::AppState { service, events });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

async fn create_repository(config: &Config) -> Result<Arc<dyn PipelineRepository>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage, state is lost on restart");
            Ok(Arc::new(InMemoryPipelineRepository::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            Ok(Arc::new(PgPipelineRepository::new(pool)))
        }
    }
}
