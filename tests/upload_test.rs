mod common;

use axum::{body::Body, http::{Request, StatusCode}};
use common::*;
use rust_csv_jobs::services::queue::{Broker, JobQueue, MemoryResultBackend, QueueError};
use rust_csv_jobs::models::TaskMessage;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_upload_stores_exact_bytes_and_queues_job() {
    let t = setup();
    let contents = "a,b\n1,2\n3,4\n";

    let (status, json) = send(&t.app, upload_request(file_part("file", "data.csv", contents))).await;

    assert_eq!(status, StatusCode::OK, "{json}");
    assert_eq!(json["message"], "File uploaded successfully");
    assert_eq!(json["filename"], "data.csv");
    let job_id = json["job_id"].as_str().unwrap();
    assert!(!job_id.is_empty());

    let stored = std::fs::read(t.upload_dir.join("data.csv")).unwrap();
    assert_eq!(stored, contents.as_bytes());

    // The broker carries a process_csv message pointing at the stored file
    let message = t
        .queue
        .next_task(Duration::from_millis(10))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.id, job_id);
    assert_eq!(message.task, "process_csv");
    assert_eq!(
        message.args["filepath"],
        t.upload_dir.join("data.csv").to_string_lossy().into_owned()
    );
}

#[tokio::test]
async fn test_upload_accepts_uppercase_extension() {
    let t = setup();

    let (status, json) = send(&t.app, upload_request(file_part("file", "REPORT.CSV", "x\n1\n"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "REPORT.CSV");
}

#[tokio::test]
async fn test_upload_rejects_other_extensions() {
    let t = setup();

    for name in ["notes.txt", "data.csv.exe", "csv", "data.", "archive.tar.gz"] {
        let (status, json) = send(&t.app, upload_request(file_part("file", name, "a,b\n"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{name}");
        assert_eq!(json["error"], "Invalid file format", "{name}");
    }

    assert!(stored_files(&t.upload_dir).is_empty());
    assert!(t.queue.next_task(Duration::from_millis(10)).await.unwrap().is_none());
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let t = setup();

    let body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"comment\"\r\n\r\n\
        hello\r\n\
        --{boundary}--\r\n",
        boundary = BOUNDARY
    );
    let (status, json) = send(&t.app, upload_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file part");
}

#[tokio::test]
async fn test_upload_with_wrong_field_name() {
    let t = setup();

    let (status, json) = send(&t.app, upload_request(file_part("upload", "data.csv", "a\n"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file part");
    assert!(stored_files(&t.upload_dir).is_empty());
}

#[tokio::test]
async fn test_upload_with_text_field_named_file() {
    let t = setup();

    let body = format!(
        "--{boundary}\r\n\
        Content-Disposition: form-data; name=\"file\"\r\n\r\n\
        a,b\n1,2\r\n\
        --{boundary}--\r\n",
        boundary = BOUNDARY
    );
    let (status, json) = send(&t.app, upload_request(body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No file part");
    assert!(stored_files(&t.upload_dir).is_empty());
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let t = setup();

    let (status, json) = send(&t.app, upload_request(file_part("file", "", "a\n"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "No selected file");
    assert!(stored_files(&t.upload_dir).is_empty());
}

#[tokio::test]
async fn test_upload_sanitizes_path_traversal() {
    let t = setup();

    let (status, json) = send(
        &t.app,
        upload_request(file_part("file", "../../etc/my data.csv", "a\n1\n")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "my_data.csv");
    assert_eq!(stored_files(&t.upload_dir), vec!["my_data.csv".to_string()]);
}

#[tokio::test]
async fn test_upload_rejects_name_that_sanitizes_away() {
    let t = setup();

    let (status, json) = send(&t.app, upload_request(file_part("file", "データ.csv", "a\n"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Invalid filename");
    assert!(stored_files(&t.upload_dir).is_empty());
}

#[tokio::test]
async fn test_upload_same_name_twice_last_write_wins() {
    let t = setup();

    let (first, _) = send(&t.app, upload_request(file_part("file", "d.csv", "a\n1\n"))).await;
    let (second, _) = send(&t.app, upload_request(file_part("file", "d.csv", "a\n2\n"))).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(std::fs::read_to_string(t.upload_dir.join("d.csv")).unwrap(), "a\n2\n");
}

#[tokio::test]
async fn test_upload_too_large() {
    let t = setup();
    let mut config = rust_csv_jobs::config::AppConfig::development();
    config.upload_folder = t.upload_dir.clone();
    config.max_file_size = 64;
    let app = rust_csv_jobs::create_app(rust_csv_jobs::AppState {
        config,
        queue: t.queue.clone(),
        storage: Arc::new(rust_csv_jobs::services::storage::LocalStorageService::new(
            t.upload_dir.clone(),
        )),
    });

    let big = "a,b\n".repeat(100);
    let (status, _) = send(&app, upload_request(file_part("file", "big.csv", &big))).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert!(stored_files(&t.upload_dir).is_empty());
}

/// Broker that refuses every message
struct DownBroker;

#[async_trait::async_trait]
impl Broker for DownBroker {
    async fn publish(&self, _message: &TaskMessage) -> Result<(), QueueError> {
        Err(QueueError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "broker down",
        )))
    }

    async fn consume(&self, _wait: Duration) -> Result<Option<TaskMessage>, QueueError> {
        Ok(None)
    }

    async fn ping(&self) -> bool {
        false
    }
}

#[tokio::test]
async fn test_failed_enqueue_removes_stored_file() {
    let queue = JobQueue::new(Arc::new(DownBroker), Arc::new(MemoryResultBackend::new()));
    let t = setup_with_queue(queue, tempfile::tempdir().unwrap());

    let (status, json) = send(&t.app, upload_request(file_part("file", "data.csv", "a\n1\n"))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["error"], "Failed to queue file for processing");
    assert!(stored_files(&t.upload_dir).is_empty());
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let t = setup();

    let response = tower::ServiceExt::oneshot(
        t.app.clone(),
        Request::builder()
            .uri("/health")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");

    let response = tower::ServiceExt::oneshot(
        t.app.clone(),
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await
    .unwrap();
    assert!(!response.headers()["x-request-id"].is_empty());
}
