//! Pipeline Repository
//!
//! Handles all database operations related to pipelines.

use stagehand_core::domain::pipeline::{Pipeline, PipelineStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a new pipeline
pub async fn create(pool: &PgPool, pipeline: &Pipeline) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pipelines (id, user_id, name, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(pipeline.id)
    .bind(pipeline.user_id)
    .bind(&pipeline.name)
    .bind(pipeline.status.as_str())
    .bind(pipeline.created_at)
    .bind(pipeline.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a pipeline by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Pipeline>, sqlx::Error> {
    let row = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, user_id, name, status, created_at, updated_at
        FROM pipelines
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Read only the status column of a pipeline
pub async fn find_status(pool: &PgPool, id: Uuid) -> Result<Option<PipelineStatus>, sqlx::Error> {
    let row: Option<(String,)> = sqlx::query_as("SELECT status FROM pipelines WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(status,)| string_to_status(&status)))
}

/// List pipelines owned by a user, newest first
pub async fn find_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Pipeline>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PipelineRow>(
        r#"
        SELECT id, user_id, name, status, created_at, updated_at
        FROM pipelines
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Write a pipeline status only if the current one is in `from`
pub async fn transition_status(
    pool: &PgPool,
    id: Uuid,
    from: &[PipelineStatus],
    to: PipelineStatus,
) -> Result<bool, sqlx::Error> {
    let allowed: Vec<String> = from.iter().map(|s| s.as_str().to_string()).collect();

    let result = sqlx::query(
        r#"
        UPDATE pipelines
        SET status = $1, updated_at = $2
        WHERE id = $3 AND status = ANY($4)
        "#,
    )
    .bind(to.as_str())
    .bind(chrono::Utc::now())
    .bind(id)
    .bind(&allowed)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a pipeline by ID unless it is running
pub async fn delete_unless_running(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM pipelines WHERE id = $1 AND status <> $2")
        .bind(id)
        .bind(PipelineStatus::Running.as_str())
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Helper Functions
// =============================================================================

fn string_to_status(s: &str) -> PipelineStatus {
    s.parse().unwrap_or_else(|err| {
        tracing::warn!("{}, treating as Failed", err);
        PipelineStatus::Failed
    })
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    id: Uuid,
    user_id: Uuid,
    name: String,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PipelineRow> for Pipeline {
    fn from(row: PipelineRow) -> Self {
        Pipeline {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            status: string_to_status(&row.status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}
