pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::api::handlers;
use crate::api::middleware::request_id::{REQUEST_ID_HEADER, request_id_middleware};
use crate::config::AppConfig;
use crate::services::queue::JobQueue;
use crate::services::storage::StorageService;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::upload::upload_file,
        handlers::status::task_status,
        handlers::health::health_check,
    ),
    components(
        schemas(
            handlers::upload::UploadForm,
            handlers::upload::UploadResponse,
            handlers::status::StatusResponse,
            handlers::health::HealthResponse,
            models::JobState,
            services::tasks::ProcessCsvOutcome,
        )
    ),
    tags(
        (name = "files", description = "CSV upload endpoints"),
        (name = "jobs", description = "Processing job status"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub queue: JobQueue,
    pub storage: Arc<dyn StorageService>,
}

pub fn create_app(state: AppState) -> Router {
    let max_file_size = state.config.max_file_size;

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/upload", post(handlers::upload::upload_file))
        .route("/status/:job_id", get(handlers::status::task_status))
        .route("/health", get(handlers::health::health_check))
        .layer(DefaultBodyLimit::max(max_file_size))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("unknown");
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = %request_id,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    info!("📥 {} {}", request.method(), request.uri());
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        info!(
                            "📤 Finished in {:?} with status {}",
                            latency,
                            response.status()
                        );
                    },
                ),
        )
        // Outermost, so the trace span already sees the id
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}
