//! HTTP API tests
//!
//! Exercise the router with in-process requests against an in-memory
//! database.

mod helpers;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt;

use courseport_common::config::ServiceConfig;
use courseport_ingest::{build_router, AppState};
use helpers::{test_pool, write_sheet};

async fn test_state(dir: &TempDir) -> AppState {
    let pool = test_pool().await;
    let config = ServiceConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        data_folder: dir.path().to_path_buf(),
        page_size: 50,
    };
    AppState::new(pool, config)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn health_returns_ok() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir).await);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "courseport-ingest");
}

#[tokio::test]
async fn create_job_rejects_empty_sheet_set() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir).await);

    let response = app
        .oneshot(post_json("/api/import/jobs", json!({ "sheets": {} })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_job_rejects_missing_sheet_file() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir).await);

    let response = app
        .oneshot(post_json(
            "/api/import/jobs",
            json!({ "sheets": { "courses": "/nonexistent/courses.csv" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir).await);

    let response = app
        .oneshot(get("/api/import/jobs/00000000-0000-0000-0000-000000000000"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_runs_to_completion_through_the_api() {
    let dir = TempDir::new().unwrap();
    let app = build_router(test_state(&dir).await);

    let sheet = write_sheet(&dir, "courses.csv", "id,course\nc1,Baking\nc2,Sourdough\n");

    // Create
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/import/jobs",
            json!({ "sheets": { "courses": sheet } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job = body_json(response).await;
    let job_id = job["job_id"].as_str().unwrap().to_string();
    assert_eq!(job["state"], "QUEUED");

    // Tick until terminal
    let tick_uri = format!("/api/import/jobs/{}/tick", job_id);
    let mut state = String::new();
    for _ in 0..10 {
        let response = app.clone().oneshot(post(&tick_uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = body_json(response).await;
        state = job["state"].as_str().unwrap().to_string();
        if state != "QUEUED" && state != "RUNNING" {
            break;
        }
    }
    assert_eq!(state, "COMPLETED");

    // Status reflects the finished job
    let response = app
        .clone()
        .oneshot(get(&format!("/api/import/jobs/{}", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let job = body_json(response).await;
    assert_eq!(job["counts"]["created"], 2);
    assert_eq!(job["counts"]["failed"], 0);

    // Log endpoint answers (no entries for a clean import)
    let response = app
        .clone()
        .oneshot(get(&format!("/api/import/jobs/{}/log", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let log = body_json(response).await;
    assert_eq!(log["entries"].as_array().unwrap().len(), 0);

    // Further ticks and cancels conflict with the terminal state
    let response = app.clone().oneshot(post(&tick_uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .oneshot(post(&format!("/api/import/jobs/{}/cancel", job_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
