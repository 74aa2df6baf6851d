//! HTTP API
//!
//! Interface boundary for the out-of-scope collaborators: the scheduler
//! calls the tick endpoint until the job reports a terminal state, and the
//! admin UI reads status and log.

pub mod health;
pub mod jobs;

use axum::routing::{get, post};
use axum::Router;

use crate::AppState;

pub fn import_routes() -> Router<AppState> {
    Router::new()
        .route("/api/import/jobs", post(jobs::create_job))
        .route("/api/import/jobs/:id", get(jobs::get_job))
        .route("/api/import/jobs/:id/tick", post(jobs::tick_job))
        .route("/api/import/jobs/:id/log", get(jobs::get_log))
        .route("/api/import/jobs/:id/cancel", post(jobs::cancel_job))
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health::health_check))
}
