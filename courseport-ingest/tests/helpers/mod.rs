//! Shared fixtures for integration tests

#![allow(dead_code)]

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;

use courseport_ingest::db;
use courseport_ingest::models::{ImportJob, SheetSet};
use courseport_ingest::services::Orchestrator;

/// Fresh in-memory database with all tables created
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(":memory:")
        .await
        .expect("Failed to create in-memory database");
    db::init_tables(&pool).await.expect("Failed to init tables");
    pool
}

/// Write a sheet fixture file into the temp dir
pub fn write_sheet(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).expect("Failed to write sheet fixture");
    path
}

/// Create a job and tick it until it reaches a terminal state
pub async fn run_job(pool: &SqlitePool, sheets: SheetSet, page_size: usize) -> ImportJob {
    let job = ImportJob::new(sheets);
    db::jobs::save_job(pool, &job).await.expect("save job");

    let orchestrator = Orchestrator::new(pool.clone(), page_size);
    let mut current = job;
    for _ in 0..100 {
        if current.is_terminal() {
            break;
        }
        current = orchestrator
            .process_next_page(current.job_id)
            .await
            .expect("tick");
    }
    assert!(current.is_terminal(), "job never reached a terminal state");
    current
}
