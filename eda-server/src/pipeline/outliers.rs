//! Outlier detection (read-only) and handling (mutating)

use std::collections::BTreeSet;

use eda_common::sanitize::finite;
use polars::prelude::*;
use serde::Serialize;

use super::{Mutation, OutlierAction, OutlierMethod};
use crate::dataset::stats::{iqr_bounds, z_scores, ZSCORE_THRESHOLD};
use crate::dataset::{ColumnKind, Dataset};
use crate::error::{ApiError, ApiResult};

/// Name of the flag column written by the `mark` action
pub const OUTLIER_FLAG_COLUMN: &str = "is_outlier";

/// Result of outlier detection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutlierReport {
    pub column: String,
    pub method: OutlierMethod,
    pub outlier_count: usize,
    /// Positional row indices into the current table
    pub outlier_indices: Vec<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower_bound: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper_bound: Option<f64>,
    /// One entry per row, `null` where undefined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z_scores: Option<Vec<Option<f64>>>,
}

/// Find outlier rows of a numeric column
pub fn detect_outliers(
    dataset: &Dataset,
    column: &str,
    method: OutlierMethod,
) -> ApiResult<OutlierReport> {
    dataset.require_numeric(column, "outlier detection")?;
    let values = dataset.float_chunked(column)?;

    let report = match method {
        OutlierMethod::Iqr => {
            let bounds = iqr_bounds(&values)?;
            let outlier_indices: Vec<usize> = match bounds {
                Some(bounds) => values
                    .into_iter()
                    .enumerate()
                    .filter(|(_, v)| v.is_some_and(|x| bounds.is_outlier(x)))
                    .map(|(row, _)| row)
                    .collect(),
                None => Vec::new(),
            };

            OutlierReport {
                column: column.to_string(),
                method,
                outlier_count: outlier_indices.len(),
                outlier_indices,
                lower_bound: bounds.and_then(|b| finite(b.lower)),
                upper_bound: bounds.and_then(|b| finite(b.upper)),
                z_scores: None,
            }
        }
        OutlierMethod::Zscore => {
            let scores = z_scores(&values);
            let outlier_indices: Vec<usize> = scores
                .iter()
                .enumerate()
                .filter(|(_, z)| z.is_some_and(|z| z.abs() > ZSCORE_THRESHOLD))
                .map(|(row, _)| row)
                .collect();

            OutlierReport {
                column: column.to_string(),
                method,
                outlier_count: outlier_indices.len(),
                outlier_indices,
                lower_bound: None,
                upper_bound: None,
                z_scores: Some(scores),
            }
        }
    };

    Ok(report)
}

/// Remove, cap or mark the rows at `indices`
///
/// Indices are positions in the current table. Duplicates are collapsed and
/// any index past the last row rejects the whole request. The output is the
/// number of distinct rows affected.
pub fn handle_outliers(
    dataset: &Dataset,
    action: OutlierAction,
    column: &str,
    indices: &[usize],
) -> ApiResult<Mutation<usize>> {
    dataset.require_column(column)?;
    if action == OutlierAction::Cap {
        dataset.require_numeric(column, "capping")?;
    }

    let rows: BTreeSet<usize> = indices.iter().copied().collect();
    let height = dataset.height();
    let out_of_range: Vec<usize> = rows.iter().copied().filter(|row| *row >= height).collect();
    if !out_of_range.is_empty() {
        return Err(ApiError::InvalidIndex(out_of_range));
    }

    let count = rows.len();
    let (next, description) = match action {
        OutlierAction::Remove => {
            let keep: Vec<bool> = (0..height).map(|row| !rows.contains(&row)).collect();
            (
                dataset.filter_rows(&keep)?,
                format!("Removed {} outliers from '{}'", count, column),
            )
        }
        OutlierAction::Cap => {
            let values = dataset.float_chunked(column)?;
            let bounds = iqr_bounds(&values)?;
            let mut capped: Vec<Option<f64>> = values.into_iter().collect();
            if let Some(bounds) = bounds {
                for row in &rows {
                    capped[*row] = capped[*row].map(|v| bounds.clamp(v));
                }
            }
            (
                dataset.with_column(Series::new(column.into(), capped), ColumnKind::Float)?,
                format!("Capped {} outliers in '{}'", count, column),
            )
        }
        OutlierAction::Mark => {
            let flags: Vec<i64> = (0..height)
                .map(|row| i64::from(rows.contains(&row)))
                .collect();
            (
                dataset.with_column(
                    Series::new(OUTLIER_FLAG_COLUMN.into(), flags),
                    ColumnKind::Integer,
                )?,
                format!("Marked {} outliers in '{}'", count, column),
            )
        }
    };

    Ok(Mutation::applied(next, description, count))
}
