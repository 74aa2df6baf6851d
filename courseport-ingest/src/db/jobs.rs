//! Import job persistence
//!
//! Jobs and their per-line log survive process restarts; the orchestrator
//! saves the job row after every page.

use courseport_common::{Error, Result};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{ImportJob, JobCounts, JobState, LogEntry, LogSeverity, SheetSet};
use crate::schema::EntityKind;

/// Save an import job (insert or update)
pub async fn save_job(pool: &SqlitePool, job: &ImportJob) -> Result<()> {
    let sheets = serde_json::to_string(&job.sheets)
        .map_err(|e| Error::Internal(format!("Failed to serialize sheets: {}", e)))?;
    let started_at = job.started_at.to_rfc3339();
    let ended_at = job.ended_at.map(|dt| dt.to_rfc3339());

    sqlx::query(
        r#"
        INSERT INTO import_jobs (
            job_id, state, sheets, sheet_index, next_row,
            created_count, updated_count, failed_count,
            cancel_requested, started_at, ended_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(job_id) DO UPDATE SET
            state = excluded.state,
            sheet_index = excluded.sheet_index,
            next_row = excluded.next_row,
            created_count = excluded.created_count,
            updated_count = excluded.updated_count,
            failed_count = excluded.failed_count,
            ended_at = excluded.ended_at
        "#,
    )
    .bind(job.job_id.to_string())
    .bind(job.state.as_str())
    .bind(&sheets)
    .bind(job.sheet_index as i64)
    .bind(job.next_row as i64)
    .bind(job.counts.created as i64)
    .bind(job.counts.updated as i64)
    .bind(job.counts.failed as i64)
    .bind(job.cancel_requested as i64)
    .bind(&started_at)
    .bind(&ended_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load an import job by id
pub async fn load_job(pool: &SqlitePool, job_id: Uuid) -> Result<Option<ImportJob>> {
    let row = sqlx::query(
        r#"
        SELECT job_id, state, sheets, sheet_index, next_row,
               created_count, updated_count, failed_count,
               cancel_requested, started_at, ended_at
        FROM import_jobs
        WHERE job_id = ?
        "#,
    )
    .bind(job_id.to_string())
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let state: String = row.get("state");
    let state = JobState::parse(&state)
        .ok_or_else(|| Error::Internal(format!("Unknown job state: {}", state)))?;

    let sheets: String = row.get("sheets");
    let sheets: SheetSet = serde_json::from_str(&sheets)
        .map_err(|e| Error::Internal(format!("Failed to deserialize sheets: {}", e)))?;

    let started_at: String = row.get("started_at");
    let started_at = chrono::DateTime::parse_from_rfc3339(&started_at)
        .map_err(|e| Error::Internal(format!("Failed to parse started_at: {}", e)))?
        .with_timezone(&chrono::Utc);

    let ended_at: Option<String> = row.get("ended_at");
    let ended_at = ended_at
        .map(|s| chrono::DateTime::parse_from_rfc3339(&s))
        .transpose()
        .map_err(|e| Error::Internal(format!("Failed to parse ended_at: {}", e)))?
        .map(|dt| dt.with_timezone(&chrono::Utc));

    Ok(Some(ImportJob {
        job_id,
        state,
        sheets,
        sheet_index: row.get::<i64, _>("sheet_index") as usize,
        next_row: row.get::<i64, _>("next_row") as usize,
        counts: JobCounts {
            created: row.get::<i64, _>("created_count") as u64,
            updated: row.get::<i64, _>("updated_count") as u64,
            failed: row.get::<i64, _>("failed_count") as u64,
        },
        cancel_requested: row.get::<i64, _>("cancel_requested") != 0,
        started_at,
        ended_at,
    }))
}

/// Flag a job for cancellation; honored before the next page starts.
///
/// Returns false when the job does not exist or is already terminal.
pub async fn request_cancel(pool: &SqlitePool, job_id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE import_jobs
        SET cancel_requested = 1
        WHERE job_id = ? AND state IN ('queued', 'running')
        "#,
    )
    .bind(job_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Append log entries for a job
pub async fn append_log(pool: &SqlitePool, job_id: Uuid, entries: &[LogEntry]) -> Result<()> {
    for entry in entries {
        sqlx::query(
            r#"
            INSERT INTO import_log (job_id, entity, line, severity, code, field, message, item_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job_id.to_string())
        .bind(entry.entity.as_str())
        .bind(entry.line as i64)
        .bind(entry.severity.as_str())
        .bind(&entry.code)
        .bind(&entry.field)
        .bind(&entry.message)
        .bind(entry.item_id)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Full per-line log for a job, in insertion order
pub async fn load_log(pool: &SqlitePool, job_id: Uuid) -> Result<Vec<LogEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT entity, line, severity, code, field, message, item_id
        FROM import_log
        WHERE job_id = ?
        ORDER BY id
        "#,
    )
    .bind(job_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let entity: String = row.get("entity");
            let entity = EntityKind::parse(&entity)
                .ok_or_else(|| Error::Internal(format!("Unknown log entity: {}", entity)))?;
            let severity: String = row.get("severity");
            let severity = LogSeverity::parse(&severity)
                .ok_or_else(|| Error::Internal(format!("Unknown log severity: {}", severity)))?;

            Ok(LogEntry {
                entity,
                line: row.get::<i64, _>("line") as u64,
                severity,
                code: row.get("code"),
                field: row.get("field"),
                message: row.get("message"),
                item_id: row.get("item_id"),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::path::PathBuf;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let pool = test_pool().await;
        let mut job = ImportJob::new(SheetSet {
            courses: Some(PathBuf::from("/tmp/courses.csv")),
            ..Default::default()
        });
        job.transition_to(JobState::Running);
        job.next_row = 42;
        job.counts.created = 10;

        save_job(&pool, &job).await.unwrap();

        let loaded = load_job(&pool, job.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.state, JobState::Running);
        assert_eq!(loaded.next_row, 42);
        assert_eq!(loaded.counts.created, 10);
        assert_eq!(loaded.sheets.courses, job.sheets.courses);
    }

    #[tokio::test]
    async fn cancel_only_applies_to_live_jobs() {
        let pool = test_pool().await;
        let mut job = ImportJob::new(SheetSet::default());
        save_job(&pool, &job).await.unwrap();

        assert!(request_cancel(&pool, job.job_id).await.unwrap());

        job.transition_to(JobState::Completed);
        save_job(&pool, &job).await.unwrap();
        assert!(!request_cancel(&pool, job.job_id).await.unwrap());
    }

    #[tokio::test]
    async fn log_round_trip_preserves_order() {
        let pool = test_pool().await;
        let job = ImportJob::new(SheetSet::default());
        save_job(&pool, &job).await.unwrap();

        let entries = vec![
            LogEntry {
                entity: EntityKind::Course,
                line: 2,
                severity: LogSeverity::Error,
                code: "validation".to_string(),
                field: Some("course".to_string()),
                message: "Required column \"course\" is empty".to_string(),
                item_id: None,
            },
            LogEntry {
                entity: EntityKind::Course,
                line: 3,
                severity: LogSeverity::Warning,
                code: "sanitize".to_string(),
                field: Some("featured".to_string()),
                message: "coerced".to_string(),
                item_id: Some(9),
            },
        ];
        append_log(&pool, job.job_id, &entries).await.unwrap();

        let loaded = load_log(&pool, job.job_id).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].line, 2);
        assert_eq!(loaded[1].item_id, Some(9));
    }
}
