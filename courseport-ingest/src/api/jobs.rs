//! Import job endpoints

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::db::jobs;
use crate::error::{ApiError, ApiResult};
use crate::models::{ImportJob, LogEntry, SheetSet};
use crate::services::Orchestrator;
use crate::AppState;

#[derive(Debug, serde::Deserialize)]
pub struct CreateJobRequest {
    pub sheets: SheetSet,
}

#[derive(Debug, Serialize)]
pub struct LogResponse {
    pub job_id: Uuid,
    pub entries: Vec<LogEntry>,
}

/// POST /api/import/jobs - create a job from attached sheet files
pub async fn create_job(
    State(state): State<AppState>,
    Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<ImportJob>)> {
    if request.sheets.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one sheet file is required".to_string(),
        ));
    }

    for kind in crate::schema::EntityKind::SHEET_ORDER {
        if let Some(path) = request.sheets.path_for(kind) {
            if !path.is_file() {
                return Err(ApiError::BadRequest(format!(
                    "{} sheet not found: {}",
                    kind,
                    path.display()
                )));
            }
        }
    }

    let job = ImportJob::new(request.sheets);
    jobs::save_job(&state.db, &job).await?;

    tracing::info!(job_id = %job.job_id, "Import job created");

    Ok((StatusCode::CREATED, Json(job)))
}

/// POST /api/import/jobs/:id/tick - process the next page
///
/// Ticks are expected to arrive sequentially from one scheduler; a tick for
/// a job that is already mid-page is rejected rather than interleaved.
pub async fn tick_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    let job = jobs::load_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {}", id)))?;
    if job.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Job {} already finished ({})",
            id,
            job.state.as_str()
        )));
    }

    {
        let mut active = state.active_jobs.lock().await;
        if !active.insert(id) {
            return Err(ApiError::Conflict(format!(
                "Job {} is already processing a page",
                id
            )));
        }
    }

    let result = Orchestrator::new(state.db.clone(), state.config.page_size)
        .process_next_page(id)
        .await;

    state.active_jobs.lock().await.remove(&id);

    Ok(Json(result?))
}

/// GET /api/import/jobs/:id - current status and counts
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    let job = jobs::load_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {}", id)))?;
    Ok(Json(job))
}

/// GET /api/import/jobs/:id/log - full per-line log
pub async fn get_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LogResponse>> {
    jobs::load_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {}", id)))?;

    let entries = jobs::load_log(&state.db, id).await?;
    Ok(Json(LogResponse { job_id: id, entries }))
}

/// POST /api/import/jobs/:id/cancel - stop before the next page
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImportJob>> {
    let job = jobs::load_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {}", id)))?;

    if job.is_terminal() {
        return Err(ApiError::Conflict(format!(
            "Job {} already finished ({})",
            id,
            job.state.as_str()
        )));
    }

    jobs::request_cancel(&state.db, id).await?;
    tracing::info!(job_id = %id, "Cancellation requested");

    let job = jobs::load_job(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("import job {}", id)))?;
    Ok(Json(job))
}
