use crate::AppState;
use crate::api::error::AppError;
use crate::models::{JobRecord, JobState};
use axum::{
    Json,
    extract::{Path, State},
};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;

pub const PENDING_MESSAGE: &str = "Task is pending";

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub state: JobState,
    /// "Task is pending", the task's result payload, or the stringified failure
    #[schema(value_type = Object)]
    pub status: Value,
}

impl From<JobRecord> for StatusResponse {
    fn from(record: JobRecord) -> Self {
        let status = match record.state {
            JobState::Pending => Value::String(PENDING_MESSAGE.to_string()),
            JobState::Failure => Value::String(record.error.unwrap_or_default()),
            JobState::Started | JobState::Success => record.result.unwrap_or(Value::Null),
        };

        Self {
            state: record.state,
            status,
        }
    }
}

/// Relays the result backend's view of a job.
///
/// Ids that were never issued read as `PENDING`, the same as a job no worker
/// has picked up yet.
#[utoipa::path(
    get,
    path = "/status/{job_id}",
    params(
        ("job_id" = String, Path, description = "Job id returned by /upload")
    ),
    responses(
        (status = 200, description = "Current job state", body = StatusResponse)
    ),
    tag = "jobs"
)]
pub async fn task_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, AppError> {
    let record = state.queue.status(&job_id).await?;
    Ok(Json(record.into()))
}
