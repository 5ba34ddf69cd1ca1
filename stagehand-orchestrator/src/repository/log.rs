//! Execution Log Repository
//!
//! Handles all database operations related to per-stage execution logs.

use stagehand_core::domain::log::ExecutionLog;
use stagehand_core::domain::stage::StageStatus;
use sqlx::PgPool;
use uuid::Uuid;

/// Append an execution log entry
pub async fn add_entry(pool: &PgPool, entry: &ExecutionLog) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO execution_logs (id, pipeline_id, stage_id, stage_name, status, error_message, recorded_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(entry.id)
    .bind(entry.pipeline_id)
    .bind(entry.stage_id)
    .bind(&entry.stage_name)
    .bind(entry.status.as_str())
    .bind(&entry.error_message)
    .bind(entry.recorded_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all execution log entries for a pipeline
pub async fn find_by_pipeline(
    pool: &PgPool,
    pipeline_id: Uuid,
) -> Result<Vec<ExecutionLog>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT id, pipeline_id, stage_id, stage_name, status, error_message, recorded_at
        FROM execution_logs
        WHERE pipeline_id = $1
        ORDER BY recorded_at ASC
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
struct LogRow {
    id: Uuid,
    pipeline_id: Uuid,
    stage_id: Uuid,
    stage_name: String,
    status: String,
    error_message: Option<String>,
    recorded_at: chrono::DateTime<chrono::Utc>,
}

impl From<LogRow> for ExecutionLog {
    fn from(row: LogRow) -> Self {
        ExecutionLog {
            id: row.id,
            pipeline_id: row.pipeline_id,
            stage_id: row.stage_id,
            stage_name: row.stage_name,
            status: row.status.parse().unwrap_or(StageStatus::Failed),
            error_message: row.error_message,
            recorded_at: row.recorded_at,
        }
    }
}
