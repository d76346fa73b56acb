//! Dataset upload
//!
//! POST /api/upload (multipart, field `file`)

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::sanitized;
use crate::dataset::{load_upload, TablePreview};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Multipart field carrying the table
pub const UPLOAD_FIELD: &str = "file";

/// POST /api/upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub preview: TablePreview,
}

/// POST /api/upload
///
/// Parses the uploaded table and opens a new session for it.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidUpload(e.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| ApiError::MissingParameter("filename".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidUpload(e.body_text()))?;
        upload = Some((filename, bytes));
    }

    let (filename, bytes) =
        upload.ok_or_else(|| ApiError::MissingParameter(UPLOAD_FIELD.to_string()))?;

    // CSV and workbook parsing are CPU-bound
    let name = filename.clone();
    let dataset = tokio::task::spawn_blocking(move || load_upload(&bytes, &name))
        .await
        .map_err(|e| ApiError::Internal(format!("Upload parsing task failed: {}", e)))??;

    let preview = TablePreview::build(&dataset, state.preview_rows())?;
    let file_id = state.sessions.create(dataset, filename.clone()).await;

    sanitized(&UploadResponse {
        file_id,
        filename,
        preview,
    })
}

/// Build upload routes with the configured body limit
pub fn upload_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
