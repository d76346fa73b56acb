//! Missing-value imputation

use polars::prelude::*;

use super::{FillMethod, Mutation};
use crate::dataset::stats::first_mode;
use crate::dataset::{ColumnKind, Dataset};
use crate::error::{ApiError, ApiResult};

/// Single value written into every missing cell
#[derive(Debug, Clone, PartialEq)]
enum FillValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
}

impl FillValue {
    fn kind(&self) -> ColumnKind {
        match self {
            FillValue::Integer(_) => ColumnKind::Integer,
            FillValue::Float(_) => ColumnKind::Float,
            FillValue::Boolean(_) => ColumnKind::Boolean,
            FillValue::Text(_) => ColumnKind::Text,
        }
    }

    /// Column with every missing cell replaced
    fn fill(&self, dataset: &Dataset, column: &str) -> ApiResult<Series> {
        let name: PlSmallStr = column.into();
        let series = match self {
            FillValue::Integer(v) => {
                let filled: Vec<Option<i64>> = integer_values(dataset, column)?
                    .into_iter()
                    .map(|x| x.or(Some(*v)))
                    .collect();
                Series::new(name, filled)
            }
            FillValue::Float(v) => {
                let filled: Vec<Option<f64>> = dataset
                    .float_values(column)?
                    .into_iter()
                    .map(|x| x.or(Some(*v)))
                    .collect();
                Series::new(name, filled)
            }
            FillValue::Boolean(v) => {
                let filled: Vec<Option<bool>> = boolean_values(dataset, column)?
                    .into_iter()
                    .map(|x| x.or(Some(*v)))
                    .collect();
                Series::new(name, filled)
            }
            FillValue::Text(v) => {
                let filled: Vec<Option<String>> = dataset
                    .text_values(column)?
                    .into_iter()
                    .map(|x| x.or_else(|| Some(v.clone())))
                    .collect();
                Series::new(name, filled)
            }
        };
        Ok(series)
    }
}

/// Replace every missing value in `column`
///
/// Mean and median produce a float column. Mode and custom keep the
/// column's kind. A column without missing values is a successful no-op.
pub fn fill_missing(
    dataset: &Dataset,
    column: &str,
    method: FillMethod,
    custom_value: Option<&str>,
) -> ApiResult<Mutation<()>> {
    let kind = dataset.require_column(column)?;
    let value = resolve_fill_value(dataset, column, kind, method, custom_value)?;

    let missing = dataset.null_count(column)?;
    if missing == 0 {
        return Ok(Mutation::unchanged(
            format!("No missing values in column '{}'", column),
            (),
        ));
    }

    let filled = value.fill(dataset, column)?;
    let next = dataset.with_column(filled, value.kind())?;

    let mut action = format!(
        "Filled {} missing values in '{}' with {}",
        missing, column, method
    );
    if let (FillMethod::Custom, Some(raw)) = (method, custom_value) {
        action.push_str(&format!(" (value: {})", raw));
    }

    Ok(Mutation::applied(next, action, ()))
}

fn resolve_fill_value(
    dataset: &Dataset,
    column: &str,
    kind: ColumnKind,
    method: FillMethod,
    custom_value: Option<&str>,
) -> ApiResult<FillValue> {
    match method {
        FillMethod::Mean | FillMethod::Median => {
            dataset.require_numeric(column, &format!("{} imputation", method))?;
            let values = dataset.float_chunked(column)?;
            let aggregate = if method == FillMethod::Mean {
                values.mean()
            } else {
                values.median()
            };
            aggregate
                .filter(|v| v.is_finite())
                .map(FillValue::Float)
                .ok_or_else(|| ApiError::EmptyColumn(column.to_string()))
        }
        FillMethod::Mode => mode_value(dataset, column, kind)?
            .ok_or_else(|| ApiError::NoModeValue(column.to_string())),
        FillMethod::Custom => {
            let raw = custom_value
                .ok_or_else(|| ApiError::MissingParameter("custom_value".to_string()))?;
            parse_custom(column, kind, raw)
        }
    }
}

fn mode_value(dataset: &Dataset, column: &str, kind: ColumnKind) -> ApiResult<Option<FillValue>> {
    let value = match kind {
        ColumnKind::Integer => first_mode(integer_values(dataset, column)?).map(FillValue::Integer),
        ColumnKind::Float => {
            // f64 is not Hash; group by bit pattern
            let bits = dataset
                .float_values(column)?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()).map(f64::to_bits));
            first_mode(bits).map(|b| FillValue::Float(f64::from_bits(b)))
        }
        ColumnKind::Boolean => first_mode(boolean_values(dataset, column)?).map(FillValue::Boolean),
        ColumnKind::Text => first_mode(dataset.text_values(column)?).map(FillValue::Text),
    };
    Ok(value)
}

fn parse_custom(column: &str, kind: ColumnKind, raw: &str) -> ApiResult<FillValue> {
    let trimmed = raw.trim();
    let mismatch = |expected: &str| ApiError::TypeMismatch {
        column: column.to_string(),
        detail: format!("expects {} fill values, got '{}'", expected, raw),
    };

    match kind {
        ColumnKind::Integer => trimmed
            .parse::<i64>()
            .map(FillValue::Integer)
            .map_err(|_| mismatch("integer")),
        ColumnKind::Float => trimmed
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(FillValue::Float)
            .ok_or_else(|| mismatch("finite float")),
        ColumnKind::Boolean => match trimmed.to_ascii_lowercase().as_str() {
            "true" => Ok(FillValue::Boolean(true)),
            "false" => Ok(FillValue::Boolean(false)),
            _ => Err(mismatch("boolean")),
        },
        ColumnKind::Text => Ok(FillValue::Text(raw.to_string())),
    }
}

fn integer_values(dataset: &Dataset, column: &str) -> ApiResult<Vec<Option<i64>>> {
    let series = dataset.series(column)?.cast(&DataType::Int64)?;
    Ok(series.i64()?.into_iter().collect())
}

fn boolean_values(dataset: &Dataset, column: &str) -> ApiResult<Vec<Option<bool>>> {
    Ok(dataset.series(column)?.bool()?.into_iter().collect())
}
