//! Cleaning endpoints
//!
//! POST /api/cleaning/remove_columns, POST /api/cleaning/fill_missing

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use super::{sanitized, MutationResponse};
use crate::error::{ApiError, ApiResult};
use crate::pipeline::{fill_missing, remove_columns, FillMethod};
use crate::AppState;

/// POST /api/cleaning/remove_columns request
#[derive(Debug, Deserialize)]
pub struct RemoveColumnsRequest {
    pub file_id: Uuid,
    #[serde(default)]
    pub columns: Vec<String>,
}

/// POST /api/cleaning/fill_missing request
#[derive(Debug, Deserialize)]
pub struct FillMissingRequest {
    pub file_id: Uuid,
    pub column: String,
    pub method: String,
    /// String, number or boolean literal; required for `custom`
    #[serde(default)]
    pub custom_value: Option<Value>,
}

/// POST /api/cleaning/remove_columns
pub async fn remove_columns_handler(
    State(state): State<AppState>,
    Json(request): Json<RemoveColumnsRequest>,
) -> ApiResult<Json<Value>> {
    let columns = request.columns;
    let committed = state
        .sessions
        .mutate(request.file_id, move |dataset| remove_columns(dataset, &columns))
        .await?;

    sanitized(&MutationResponse::from_committed(
        &committed,
        state.preview_rows(),
    )?)
}

/// POST /api/cleaning/fill_missing
pub async fn fill_missing_handler(
    State(state): State<AppState>,
    Json(request): Json<FillMissingRequest>,
) -> ApiResult<Json<Value>> {
    let method: FillMethod = request.method.parse()?;
    let custom_value = custom_literal(request.custom_value)?;

    let column = request.column;
    let committed = state
        .sessions
        .mutate(request.file_id, move |dataset| {
            fill_missing(dataset, &column, method, custom_value.as_deref())
        })
        .await?;

    sanitized(&MutationResponse::from_committed(
        &committed,
        state.preview_rows(),
    )?)
}

/// Flatten a JSON scalar to the literal text the pipeline parses
fn custom_literal(value: Option<Value>) -> ApiResult<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(ApiError::TypeMismatch {
            column: "custom_value".to_string(),
            detail: format!("must be a scalar, got {}", other),
        }),
    }
}

pub fn cleaning_routes() -> Router<AppState> {
    Router::new()
        .route("/api/cleaning/remove_columns", post(remove_columns_handler))
        .route("/api/cleaning/fill_missing", post(fill_missing_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_custom_literal_accepts_scalars() {
        assert_eq!(custom_literal(None).unwrap(), None);
        assert_eq!(custom_literal(Some(Value::Null)).unwrap(), None);
        assert_eq!(custom_literal(Some(json!(0))).unwrap(), Some("0".to_string()));
        assert_eq!(custom_literal(Some(json!("n/a"))).unwrap(), Some("n/a".to_string()));
        assert_eq!(custom_literal(Some(json!(true))).unwrap(), Some("true".to_string()));
        assert!(custom_literal(Some(json!([1]))).is_err());
    }
}
