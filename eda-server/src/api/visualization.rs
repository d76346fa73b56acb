//! Chart endpoints
//!
//! POST /api/visualization/generate (PNG image),
//! POST /api/visualization/data (the same chart as JSON)

use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::sanitized;
use crate::error::ApiResult;
use crate::render::{build_chart, ChartSpec, ChartType};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChartRequest {
    pub file_id: Uuid,
    pub chart_type: String,
    pub x_col: String,
    #[serde(default)]
    pub y_col: Option<String>,
    #[serde(default)]
    pub hue_col: Option<String>,
}

impl ChartRequest {
    fn into_spec(self) -> ApiResult<(Uuid, ChartSpec)> {
        let chart_type: ChartType = self.chart_type.parse()?;
        Ok((
            self.file_id,
            ChartSpec::new(chart_type, self.x_col, self.y_col, self.hue_col),
        ))
    }
}

/// POST /api/visualization/generate
pub async fn generate_chart(
    State(state): State<AppState>,
    Json(request): Json<ChartRequest>,
) -> ApiResult<Response> {
    let (file_id, spec) = request.into_spec()?;
    let renderer = state.chart_renderer.clone();

    let image = state
        .sessions
        .query(file_id, move |session| {
            renderer.render(&build_chart(&session.current, &spec)?)
        })
        .await?;

    tracing::debug!(
        session_id = %file_id,
        bytes = image.bytes.len(),
        "Rendered chart"
    );

    Ok((
        [(header::CONTENT_TYPE, HeaderValue::from_static(image.content_type))],
        image.bytes,
    )
        .into_response())
}

/// POST /api/visualization/data
pub async fn chart_data(
    State(state): State<AppState>,
    Json(request): Json<ChartRequest>,
) -> ApiResult<Json<Value>> {
    let (file_id, spec) = request.into_spec()?;

    let chart = state
        .sessions
        .query(file_id, move |session| build_chart(&session.current, &spec))
        .await?;

    sanitized(&chart)
}

pub fn visualization_routes() -> Router<AppState> {
    Router::new()
        .route("/api/visualization/generate", post(generate_chart))
        .route("/api/visualization/data", post(chart_data))
}
