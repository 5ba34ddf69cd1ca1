//! Stage Repository
//!
//! Handles all database operations related to stage records.

use stagehand_core::domain::stage::{StageRecord, StageStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// Insert a stage record
pub async fn create(pool: &PgPool, stage: &StageRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO stages (id, pipeline_id, name, position, status, error_message, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(stage.id)
    .bind(stage.pipeline_id)
    .bind(&stage.name)
    .bind(stage.position)
    .bind(stage.status.as_str())
    .bind(&stage.error_message)
    .bind(stage.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Update a stage status, leaving terminal stages untouched
pub async fn update_status(
    pool: &PgPool,
    stage_id: Uuid,
    status: StageStatus,
    error_message: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE stages
        SET status = $1, error_message = $2, updated_at = $3
        WHERE id = $4 AND status NOT IN ('Completed', 'Failed')
        "#,
    )
    .bind(status.as_str())
    .bind(error_message)
    .bind(chrono::Utc::now())
    .bind(stage_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Check whether a stage row exists
pub async fn exists(pool: &PgPool, stage_id: Uuid) -> Result<bool, sqlx::Error> {
    let row: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM stages WHERE id = $1)")
        .bind(stage_id)
        .fetch_one(pool)
        .await?;

    Ok(row.0)
}

/// Get all stages of a pipeline in creation order
pub async fn find_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<StageRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, pipeline_id, name, position, status, error_message, updated_at
        FROM stages
        WHERE pipeline_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(pipeline_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StageRow {
    id: Uuid,
    pipeline_id: Uuid,
    name: String,
    position: i32,
    status: String,
    error_message: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<StageRow> for StageRecord {
    fn from(row: StageRow) -> Self {
        StageRecord {
            id: row.id,
            pipeline_id: row.pipeline_id,
            name: row.name,
            position: row.position,
            status: row.status.parse().unwrap_or(StageStatus::Pending),
            error_message: row.error_message,
            updated_at: row.updated_at,
        }
    }
}
