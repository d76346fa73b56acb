//! HTTP API handlers for eda-server

pub mod buildinfo;
pub mod cleaning;
pub mod download;
pub mod health;
pub mod outliers;
pub mod overview;
pub mod report;
pub mod upload;
pub mod visualization;

use axum::Json;
use eda_common::sanitize::to_sanitized_json;
use serde::Serialize;
use serde_json::Value;

use crate::dataset::TablePreview;
use crate::error::{ApiError, ApiResult};
use crate::session::Committed;

pub use buildinfo::get_build_info;
pub use cleaning::cleaning_routes;
pub use download::download_routes;
pub use health::{health_routes, root_routes};
pub use outliers::outlier_routes;
pub use overview::overview_routes;
pub use report::report_routes;
pub use upload::upload_routes;
pub use visualization::visualization_routes;

/// Response body of every mutating endpoint
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub status: &'static str,
    pub message: String,
    /// Action log entry, `null` when the request changed nothing
    pub action: Option<String>,
    pub preview: TablePreview,
}

impl MutationResponse {
    pub fn from_committed<R>(committed: &Committed<R>, preview_rows: usize) -> ApiResult<Self> {
        Ok(Self {
            status: "success",
            message: committed.message.clone(),
            action: committed.action.clone(),
            preview: TablePreview::build(&committed.current, preview_rows)?,
        })
    }
}

/// JSON response body with every non-finite float replaced by `null`
pub fn sanitized<T: Serialize>(body: &T) -> ApiResult<Json<Value>> {
    to_sanitized_json(body)
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Response serialization failed: {}", e)))
}
