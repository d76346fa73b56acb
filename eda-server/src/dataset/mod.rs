//! Bridge to the tabular engine (polars)
//!
//! A [`Dataset`] pairs an eager `DataFrame` with one [`ColumnKind`] per
//! column. Kinds are resolved from the polars dtype when the table is
//! loaded and then carried explicitly through every transform, so "is this
//! column numeric" is a lookup rather than a probe of the data.
//!
//! Datasets are immutable values: transforms return a new `Dataset` and
//! leave the source untouched.

pub mod export;
pub mod load;
pub mod preview;
pub mod stats;

use std::collections::BTreeMap;

use eda_common::sanitize::float_value;
use polars::prelude::*;
use serde::Serialize;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub use load::load_upload;
pub use preview::TablePreview;

/// Per-column type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    Text,
}

impl ColumnKind {
    /// Resolve the kind of a polars dtype
    pub fn from_dtype(dtype: &DataType) -> Self {
        if dtype.is_integer() {
            ColumnKind::Integer
        } else if dtype.is_float() {
            ColumnKind::Float
        } else if matches!(dtype, DataType::Boolean) {
            ColumnKind::Boolean
        } else {
            ColumnKind::Text
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::Text => "text",
        }
    }
}

/// Immutable table plus its column kinds
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    kinds: Vec<ColumnKind>,
}

impl Dataset {
    /// Wrap a freshly loaded frame, resolving column kinds once
    pub fn new(frame: DataFrame) -> Self {
        let kinds = frame
            .get_columns()
            .iter()
            .map(|column| ColumnKind::from_dtype(column.dtype()))
            .collect();
        Self { frame, kinds }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn width(&self) -> usize {
        self.frame.width()
    }

    /// `[rows, columns]`
    pub fn shape(&self) -> [usize; 2] {
        [self.height(), self.width()]
    }

    /// Column names in table order
    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_index(name).is_some()
    }

    /// Kind of a column, `None` when absent
    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.frame
            .get_column_index(name)
            .and_then(|idx| self.kinds.get(idx).copied())
    }

    /// Names (in request order) that are not columns of this table
    pub fn missing_columns<'a, I>(&self, names: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        names
            .into_iter()
            .filter(|name| !self.has_column(name))
            .map(str::to_string)
            .collect()
    }

    /// Kind of an existing column, `InvalidColumn` otherwise
    pub fn require_column(&self, name: &str) -> ApiResult<ColumnKind> {
        self.kind_of(name)
            .ok_or_else(|| ApiError::InvalidColumn(vec![name.to_string()]))
    }

    /// Like [`Dataset::require_column`] but the column must also be numeric
    pub fn require_numeric(&self, name: &str, operation: &str) -> ApiResult<ColumnKind> {
        let kind = self.require_column(name)?;
        if kind.is_numeric() {
            Ok(kind)
        } else {
            Err(ApiError::not_numeric(name, operation))
        }
    }

    /// Borrow a column as a materialized series
    pub fn series(&self, name: &str) -> ApiResult<&Series> {
        Ok(self.frame.column(name)?.as_materialized_series())
    }

    /// Numeric column cast to `f64`
    pub fn float_chunked(&self, name: &str) -> ApiResult<Float64Chunked> {
        let series = self.series(name)?.cast(&DataType::Float64)?;
        Ok(series.f64()?.clone())
    }

    /// Numeric column as `f64` values in row order
    pub fn float_values(&self, name: &str) -> ApiResult<Vec<Option<f64>>> {
        Ok(self.float_chunked(name)?.into_iter().collect())
    }

    /// Any column rendered as text in row order (missing stays `None`)
    pub fn text_values(&self, name: &str) -> ApiResult<Vec<Option<String>>> {
        let series = self.series(name)?;
        let mut values = Vec::with_capacity(series.len());
        for row in 0..series.len() {
            let value = series.get(row)?;
            values.push(match value {
                AnyValue::Null => None,
                other => Some(cell_text(&other)),
            });
        }
        Ok(values)
    }

    pub fn null_count(&self, name: &str) -> ApiResult<usize> {
        Ok(self.frame.column(name)?.null_count())
    }

    /// Missing values per column
    pub fn null_counts(&self) -> BTreeMap<String, usize> {
        self.frame
            .get_columns()
            .iter()
            .map(|column| (column.name().to_string(), column.null_count()))
            .collect()
    }

    /// Engine dtype name per column
    pub fn dtypes(&self) -> BTreeMap<String, String> {
        self.frame
            .get_columns()
            .iter()
            .map(|column| (column.name().to_string(), column.dtype().to_string()))
            .collect()
    }

    /// Column kind per column
    pub fn kinds(&self) -> BTreeMap<String, ColumnKind> {
        self.column_names()
            .into_iter()
            .zip(self.kinds.iter().copied())
            .collect()
    }

    /// Names of columns with the given predicate on their kind
    pub fn columns_where(&self, predicate: impl Fn(ColumnKind) -> bool) -> Vec<String> {
        self.column_names()
            .into_iter()
            .zip(self.kinds.iter().copied())
            .filter(|(_, kind)| predicate(*kind))
            .map(|(name, _)| name)
            .collect()
    }

    /// Projection onto every column except `names`
    pub fn without_columns(&self, names: &[String]) -> ApiResult<Dataset> {
        let (keep, kinds): (Vec<String>, Vec<ColumnKind>) = self
            .column_names()
            .into_iter()
            .zip(self.kinds.iter().copied())
            .filter(|(name, _)| !names.contains(name))
            .unzip();

        let frame = self.frame.select(keep)?;
        Ok(Dataset { frame, kinds })
    }

    /// Rows where `keep` is true, in original order
    pub fn filter_rows(&self, keep: &[bool]) -> ApiResult<Dataset> {
        let mask = Series::new("keep".into(), keep);
        let frame = self.frame.filter(mask.bool()?)?;
        Ok(Dataset {
            frame,
            kinds: self.kinds.clone(),
        })
    }

    /// Replace a column of the same name, or append a new one
    pub fn with_column(&self, series: Series, kind: ColumnKind) -> ApiResult<Dataset> {
        let existing = self.frame.get_column_index(series.name().as_str());
        let mut frame = self.frame.clone();
        frame.with_column(series)?;

        let mut kinds = self.kinds.clone();
        match existing {
            Some(idx) => kinds[idx] = kind,
            None => kinds.push(kind),
        }
        Ok(Dataset { frame, kinds })
    }

    /// First `limit` rows as column → value records
    pub fn head_records(&self, limit: usize) -> ApiResult<Vec<serde_json::Map<String, Value>>> {
        let rows = limit.min(self.height());
        let columns = self.frame.get_columns();
        let mut records = Vec::with_capacity(rows);

        for row in 0..rows {
            let mut record = serde_json::Map::new();
            for column in columns {
                let value = column.as_materialized_series().get(row)?;
                record.insert(column.name().to_string(), any_value_to_json(&value));
            }
            records.push(record);
        }

        Ok(records)
    }

    /// Every cell of a row rendered as text (missing cells are empty)
    pub fn row_text(&self, row: usize) -> ApiResult<Vec<String>> {
        self.frame
            .get_columns()
            .iter()
            .map(|column| {
                let value = column.as_materialized_series().get(row)?;
                Ok(cell_text(&value))
            })
            .collect()
    }
}

/// Convert an engine value to JSON, nulling non-finite floats
pub fn any_value_to_json(value: &AnyValue<'_>) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(v) => Value::Bool(*v),
        AnyValue::Int8(v) => Value::from(*v),
        AnyValue::Int16(v) => Value::from(*v),
        AnyValue::Int32(v) => Value::from(*v),
        AnyValue::Int64(v) => Value::from(*v),
        AnyValue::UInt8(v) => Value::from(*v),
        AnyValue::UInt16(v) => Value::from(*v),
        AnyValue::UInt32(v) => Value::from(*v),
        AnyValue::UInt64(v) => Value::from(*v),
        AnyValue::Float32(v) => float_value(f64::from(*v)),
        AnyValue::Float64(v) => float_value(*v),
        AnyValue::String(v) => Value::String((*v).to_string()),
        AnyValue::StringOwned(v) => Value::String(v.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Plain text of a cell; strings are unquoted and missing is empty
pub fn cell_text(value: &AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::String(v) => (*v).to_string(),
        AnyValue::StringOwned(v) => v.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// `[id, value]` with rows (1,10),(2,12),(3,11),(4,1000),(5,9)
    pub fn id_value() -> Dataset {
        let frame = df!(
            "id" => [1i64, 2, 3, 4, 5],
            "value" => [10i64, 12, 11, 1000, 9],
        )
        .unwrap();
        Dataset::new(frame)
    }

    /// Numeric column with gaps plus an untouched text column
    pub fn with_gaps() -> Dataset {
        let frame = df!(
            "score" => [Some(1.0f64), None, Some(3.0), None],
            "city" => [Some("Oslo"), Some("Lima"), None, Some("Lima")],
        )
        .unwrap();
        Dataset::new(frame)
    }
}
