//! Health check endpoint

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// GET /health - liveness and uptime
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let uptime = (chrono::Utc::now() - state.startup_time).num_seconds();
    Json(json!({
        "status": "ok",
        "service": "courseport-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": uptime,
    }))
}
