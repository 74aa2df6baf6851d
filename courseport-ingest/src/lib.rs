//! courseport-ingest library interface
//!
//! Exposes the import engine and HTTP router for the binary and for
//! integration tests.

pub mod api;
pub mod db;
pub mod error;
pub mod ingest;
pub mod models;
pub mod schema;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use courseport_common::config::ServiceConfig;
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved service configuration
    pub config: Arc<ServiceConfig>,
    /// Jobs currently processing a page; ticks are not interleaved
    pub active_jobs: Arc<Mutex<HashSet<Uuid>>>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: ServiceConfig) -> Self {
        Self {
            db,
            config: Arc::new(config),
            active_jobs: Arc::new(Mutex::new(HashSet::new())),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::import_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
