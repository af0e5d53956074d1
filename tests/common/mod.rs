#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use rust_csv_jobs::config::AppConfig;
use rust_csv_jobs::services::queue::JobQueue;
use rust_csv_jobs::services::storage::LocalStorageService;
use rust_csv_jobs::{AppState, create_app};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub struct TestApp {
    pub app: Router,
    pub queue: JobQueue,
    pub upload_dir: PathBuf,
    _dir: TempDir,
}

pub fn setup_with_queue(queue: JobQueue, dir: TempDir) -> TestApp {
    let upload_dir = dir.path().join("uploads");
    std::fs::create_dir_all(&upload_dir).unwrap();

    let mut config = AppConfig::development();
    config.upload_folder = upload_dir.clone();

    let state = AppState {
        config,
        queue: queue.clone(),
        storage: Arc::new(LocalStorageService::new(upload_dir.clone())),
    };

    TestApp {
        app: create_app(state),
        queue,
        upload_dir,
        _dir: dir,
    }
}

pub fn setup() -> TestApp {
    setup_with_queue(JobQueue::in_memory(), tempfile::tempdir().unwrap())
}

/// Multipart body with one file part
pub fn file_part(field: &str, filename: &str, contents: &str) -> String {
    format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
        Content-Type: text/csv\r\n\r\n\
        {contents}\r\n\
        --{boundary}--\r\n",
        boundary = BOUNDARY
    )
}

pub fn upload_request(body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub async fn get_status(app: &Router, job_id: &str) -> (StatusCode, Value) {
    send(
        app,
        Request::builder()
            .uri(format!("/status/{}", job_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await
}

pub fn stored_files(dir: &PathBuf) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
