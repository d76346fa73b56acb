//! Outlier endpoints
//!
//! POST /api/outliers/detect (read-only), POST /api/outliers/handle

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{sanitized, MutationResponse};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{detect_outliers, handle_outliers, OutlierAction, OutlierMethod, OutlierReport};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DetectOutliersRequest {
    pub file_id: Uuid,
    pub column: String,
    pub method: String,
}

#[derive(Debug, Serialize)]
pub struct DetectOutliersResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub report: OutlierReport,
}

#[derive(Debug, Deserialize)]
pub struct HandleOutliersRequest {
    pub file_id: Uuid,
    pub action: String,
    pub column: String,
    /// Positional row indices of the current table
    pub outlier_indices: Option<Vec<usize>>,
}

#[derive(Debug, Serialize)]
pub struct HandleOutliersResponse {
    #[serde(flatten)]
    pub result: MutationResponse,
    /// Distinct rows removed, capped or marked
    pub affected_rows: usize,
}

/// POST /api/outliers/detect
pub async fn detect_handler(
    State(state): State<AppState>,
    Json(request): Json<DetectOutliersRequest>,
) -> ApiResult<Json<Value>> {
    let method: OutlierMethod = request.method.parse()?;

    let column = request.column.clone();
    let report = state
        .sessions
        .query(request.file_id, move |session| {
            detect_outliers(&session.current, &column, method)
        })
        .await?;

    tracing::debug!(
        session_id = %request.file_id,
        column = %request.column,
        outlier_count = report.outlier_count,
        "Detected outliers"
    );

    sanitized(&DetectOutliersResponse {
        status: "success",
        report,
    })
}

/// POST /api/outliers/handle
pub async fn handle_handler(
    State(state): State<AppState>,
    Json(request): Json<HandleOutliersRequest>,
) -> ApiResult<Json<Value>> {
    let action: OutlierAction = request.action.parse()?;
    let indices = request
        .outlier_indices
        .ok_or_else(|| ApiError::MissingParameter("outlier_indices".to_string()))?;

    let column = request.column;
    let committed = state
        .sessions
        .mutate(request.file_id, move |dataset| {
            handle_outliers(dataset, action, &column, &indices)
        })
        .await?;

    sanitized(&HandleOutliersResponse {
        affected_rows: committed.output,
        result: MutationResponse::from_committed(&committed, state.preview_rows())?,
    })
}

pub fn outlier_routes() -> Router<AppState> {
    Router::new()
        .route("/api/outliers/detect", post(detect_handler))
        .route("/api/outliers/handle", post(handle_handler))
}
