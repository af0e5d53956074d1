use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub broker: String,
    pub result_backend: String,
    pub version: String,
}

fn connectivity(ok: bool) -> String {
    let status = if ok { "connected" } else { "disconnected" };
    status.to_string()
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        broker: connectivity(state.queue.broker_healthy().await),
        result_backend: connectivity(state.queue.result_backend_healthy().await),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
