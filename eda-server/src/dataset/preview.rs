//! Row-oriented preview returned by upload, overview and every mutation

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::{ColumnKind, Dataset};
use crate::error::ApiResult;

/// Snapshot of a table suitable for JSON responses
#[derive(Debug, Clone, Serialize)]
pub struct TablePreview {
    /// Column names in table order
    pub columns: Vec<String>,
    /// Engine dtype per column
    pub dtypes: BTreeMap<String, String>,
    /// Resolved kind per column
    pub kinds: BTreeMap<String, ColumnKind>,
    /// Missing values per column
    pub null_counts: BTreeMap<String, usize>,
    /// First rows as column → value records
    pub head: Vec<serde_json::Map<String, Value>>,
    /// `[rows, columns]`
    pub shape: [usize; 2],
}

impl TablePreview {
    pub fn build(dataset: &Dataset, rows: usize) -> ApiResult<Self> {
        Ok(Self {
            columns: dataset.column_names(),
            dtypes: dataset.dtypes(),
            kinds: dataset.kinds(),
            null_counts: dataset.null_counts(),
            head: dataset.head_records(rows)?,
            shape: dataset.shape(),
        })
    }
}
