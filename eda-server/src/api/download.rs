//! Cleaned table download
//!
//! GET /api/download/:file_id

use axum::{
    extract::{Path, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use uuid::Uuid;

use crate::dataset::export::{cleaned_filename, to_csv_bytes};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /api/download/:file_id
pub async fn download_csv(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Response> {
    let (filename, bytes) = state
        .sessions
        .query(file_id, |session| {
            Ok((
                cleaned_filename(&session.filename),
                to_csv_bytes(&session.current)?,
            ))
        })
        .await?;

    attachment("text/csv; charset=utf-8", &filename, bytes)
}

/// Binary response offered to the browser as a file
pub(crate) fn attachment(
    content_type: &'static str,
    filename: &str,
    bytes: Vec<u8>,
) -> ApiResult<Response> {
    let safe_name: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", safe_name))
        .map_err(|e| ApiError::Internal(format!("Invalid download filename: {}", e)))?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

pub fn download_routes() -> Router<AppState> {
    Router::new().route("/api/download/:file_id", get(download_csv))
}
