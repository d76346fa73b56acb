//! Report generation
//!
//! POST /api/report/generate/:file_id, optional JSON array body of
//! dashboard-side actions to include in the report.

use axum::{
    extract::{Path, State},
    response::Response,
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use super::download::attachment;
use crate::error::ApiResult;
use crate::render::ReportInput;
use crate::AppState;

/// POST /api/report/generate/:file_id
pub async fn generate_report(
    State(state): State<AppState>,
    Path(file_id): Path<Uuid>,
    user_actions: Option<Json<Vec<Value>>>,
) -> ApiResult<Response> {
    let user_actions = user_actions.map(|Json(actions)| actions).unwrap_or_default();
    let renderer = state.report_renderer.clone();

    let (filename, artifact) = state
        .sessions
        .query(file_id, move |session| {
            let artifact = renderer.render(&ReportInput {
                filename: &session.filename,
                current: &session.current,
                original_shape: session.original.shape(),
                actions: &session.actions,
                user_actions: &user_actions,
                generated_at: Utc::now(),
            })?;
            Ok((session.filename.clone(), artifact))
        })
        .await?;

    tracing::info!(
        session_id = %file_id,
        bytes = artifact.bytes.len(),
        "Generated report"
    );

    let stem = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(&filename);
    let download_name = format!("eda_report_{}.{}", stem, artifact.file_extension);
    attachment(artifact.content_type, &download_name, artifact.bytes)
}

pub fn report_routes() -> Router<AppState> {
    Router::new().route("/api/report/generate/:file_id", post(generate_report))
}
