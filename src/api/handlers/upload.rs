use crate::AppState;
use crate::api::error::AppError;
use crate::models::UploadedFile;
use crate::services::tasks::{PROCESS_CSV, ProcessCsvArgs};
use crate::utils::validation::{ValidationError, validate_upload_filename};
use axum::{
    Json,
    body::Bytes,
    extract::{Multipart, State},
};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct UploadResponse {
    pub message: String,
    /// Name the file was stored under after sanitizing
    pub filename: String,
    /// Id to poll `/status/{job_id}` with
    pub job_id: String,
}

/// Multipart form accepted by `/upload`
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File uploaded and queued for processing", body = UploadResponse),
        (status = 400, description = "Missing file part, empty filename or not a CSV"),
        (status = 413, description = "File too large"),
        (status = 503, description = "Job could not be queued")
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut upload: Option<(String, Bytes)> = None;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") || upload.is_some() {
            continue;
        }
        // Without a filename parameter the part is a plain form field, not a file
        let Some(original_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field.bytes().await?;
        upload = Some((original_name, data));
    }

    let (original_name, data) = upload.ok_or_else(ValidationError::missing_file_part)?;
    let stored_name = validate_upload_filename(&original_name)?;

    let path = state.storage.save(&stored_name, &data).await?;
    let uploaded = UploadedFile {
        original_name,
        stored_name,
        path,
    };
    tracing::info!(
        "📄 Stored upload {:?} as {} ({} bytes)",
        uploaded.original_name,
        uploaded.path.display(),
        data.len()
    );

    let args = serde_json::to_value(ProcessCsvArgs {
        filepath: uploaded.path.to_string_lossy().into_owned(),
    })
    .map_err(|e| AppError::Internal(e.to_string()))?;

    // Write-then-enqueue: a file nobody will process is removed again
    let job_id = match state.queue.submit(PROCESS_CSV, args).await {
        Ok(id) => id,
        Err(e) => {
            tracing::error!("Failed to queue {}: {}", uploaded.stored_name, e);
            if let Err(cleanup) = state.storage.delete(&uploaded.path).await {
                tracing::error!("Failed to remove orphaned upload: {:?}", cleanup);
            }
            return Err(AppError::ServiceUnavailable(
                "Failed to queue file for processing".to_string(),
            ));
        }
    };

    tracing::info!("📨 Job {} queued for {}", job_id, uploaded.stored_name);

    Ok(Json(UploadResponse {
        message: "File uploaded successfully".to_string(),
        filename: uploaded.stored_name,
        job_id,
    }))
}
