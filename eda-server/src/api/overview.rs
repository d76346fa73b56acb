//! Session overview
//!
//! GET /api/overview/:file_id

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use super::sanitized;
use crate::dataset::TablePreview;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    /// `[rows, columns]` at upload
    pub original_shape: [usize; 2],
    pub actions: Vec<String>,
    pub preview: TablePreview,
}

/// GET /api/overview/:file_id
pub async fn get_overview(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let rows = state.preview_rows();
    let response = state
        .sessions
        .query(file_id, move |session| {
            Ok(OverviewResponse {
                file_id: session.id,
                filename: session.filename.clone(),
                created_at: session.created_at,
                original_shape: session.original.shape(),
                actions: session.actions.clone(),
                preview: TablePreview::build(&session.current, rows)?,
            })
        })
        .await?;

    sanitized(&response)
}

pub fn overview_routes() -> Router<AppState> {
    Router::new().route("/api/overview/:file_id", get(get_overview))
}
