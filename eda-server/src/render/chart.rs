//! Plot-ready chart data
//!
//! Grouping and aggregation only. [`super::plot`] turns the result into
//! pixels, and the same data is served as JSON for client-side drawing.

use std::collections::HashMap;
use std::str::FromStr;

use polars::prelude::*;
use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartType {
    Bar,
    Line,
    Scatter,
    Histogram,
    Box,
}

impl ChartType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartType::Bar => "bar",
            ChartType::Line => "line",
            ChartType::Scatter => "scatter",
            ChartType::Histogram => "histogram",
            ChartType::Box => "box",
        }
    }

    fn needs_y(self) -> bool {
        !matches!(self, ChartType::Histogram)
    }
}

impl FromStr for ChartType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartType::Bar),
            "line" => Ok(ChartType::Line),
            "scatter" => Ok(ChartType::Scatter),
            "histogram" => Ok(ChartType::Histogram),
            "box" => Ok(ChartType::Box),
            _ => Err(ApiError::InvalidMethod(format!(
                "'{}' (expected bar, line, scatter, histogram or box)",
                s
            ))),
        }
    }
}

/// Validated chart parameters
#[derive(Debug, Clone)]
pub struct ChartSpec {
    pub chart_type: ChartType,
    pub x_col: String,
    pub y_col: Option<String>,
    pub hue_col: Option<String>,
}

impl ChartSpec {
    /// Blank `y_col` / `hue_col` are treated as absent
    pub fn new(
        chart_type: ChartType,
        x_col: impl Into<String>,
        y_col: Option<String>,
        hue_col: Option<String>,
    ) -> Self {
        let present = |col: Option<String>| col.filter(|c| !c.trim().is_empty());
        Self {
            chart_type,
            x_col: x_col.into(),
            y_col: present(y_col),
            hue_col: present(hue_col),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub chart_type: ChartType,
    pub x_col: String,
    pub y_col: Option<String>,
    pub hue_col: Option<String>,
    /// One series per hue value, or a single unnamed series
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub name: Option<String>,
    #[serde(flatten)]
    pub data: SeriesData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum SeriesData {
    /// Mean of y per x label (bar, line)
    Grouped {
        labels: Vec<String>,
        values: Vec<Option<f64>>,
    },
    /// Raw finite pairs (scatter)
    Points { x: Vec<f64>, y: Vec<f64> },
    /// `edges.len() == counts.len() + 1` (histogram)
    Bins { edges: Vec<f64>, counts: Vec<usize> },
    /// Five-number summary per x label (box)
    Boxes {
        labels: Vec<String>,
        boxes: Vec<FiveNumberSummary>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FiveNumberSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Aggregate the current table for one chart
pub fn build_chart(dataset: &Dataset, spec: &ChartSpec) -> ApiResult<ChartData> {
    let named = std::iter::once(spec.x_col.as_str())
        .chain(spec.y_col.as_deref())
        .chain(spec.hue_col.as_deref());
    let missing = dataset.missing_columns(named);
    if !missing.is_empty() {
        return Err(ApiError::InvalidColumn(missing));
    }

    let y_col = match (&spec.y_col, spec.chart_type.needs_y()) {
        (Some(y), _) => Some(y.as_str()),
        (None, true) => return Err(ApiError::MissingParameter("y_col".to_string())),
        (None, false) => None,
    };

    let operation = format!("{} charts", spec.chart_type.as_str());
    match spec.chart_type {
        ChartType::Scatter | ChartType::Histogram => {
            dataset.require_numeric(&spec.x_col, &operation)?;
        }
        _ => {}
    }
    if let Some(y) = y_col {
        if spec.chart_type.needs_y() {
            dataset.require_numeric(y, &operation)?;
        }
    }

    let groups = hue_groups(dataset, spec.hue_col.as_deref())?;
    let mut series = Vec::with_capacity(groups.len());

    for (name, rows) in groups {
        let data = match spec.chart_type {
            ChartType::Bar | ChartType::Line => {
                grouped_means(dataset, &spec.x_col, y_col.unwrap_or_default(), &rows)?
            }
            ChartType::Scatter => points(dataset, &spec.x_col, y_col.unwrap_or_default(), &rows)?,
            ChartType::Histogram => bins(dataset, &spec.x_col, &rows)?,
            ChartType::Box => boxes(dataset, &spec.x_col, y_col.unwrap_or_default(), &rows)?,
        };
        series.push(ChartSeries { name, data });
    }

    Ok(ChartData {
        chart_type: spec.chart_type,
        x_col: spec.x_col.clone(),
        y_col: spec.y_col.clone(),
        hue_col: spec.hue_col.clone(),
        series,
    })
}

/// Keys in first-seen order with the rows holding each key
fn ordered_groups<K: AsRef<str>>(
    rows: impl IntoIterator<Item = (usize, K)>,
) -> Vec<(String, Vec<usize>)> {
    let mut groups: Vec<(String, Vec<usize>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row, key) in rows {
        let key = key.as_ref();
        match index.get(key) {
            Some(&slot) => groups[slot].1.push(row),
            None => {
                index.insert(key.to_string(), groups.len());
                groups.push((key.to_string(), vec![row]));
            }
        }
    }
    groups
}

/// Rows per hue value; rows with a missing hue are left out
fn hue_groups(dataset: &Dataset, hue_col: Option<&str>) -> ApiResult<Vec<(Option<String>, Vec<usize>)>> {
    let Some(hue_col) = hue_col else {
        return Ok(vec![(None, (0..dataset.height()).collect())]);
    };

    let hues = dataset.text_values(hue_col)?;
    let groups = ordered_groups(
        hues.iter()
            .enumerate()
            .filter_map(|(row, hue)| hue.as_deref().map(|h| (row, h))),
    );
    Ok(groups
        .into_iter()
        .map(|(name, rows)| (Some(name), rows))
        .collect())
}

/// Finite y values of `rows` grouped by x label
fn y_by_label(
    dataset: &Dataset,
    x_col: &str,
    y_col: &str,
    rows: &[usize],
) -> ApiResult<Vec<(String, Vec<f64>)>> {
    let labels = dataset.text_values(x_col)?;
    let ys = dataset.float_values(y_col)?;

    let keyed = rows.iter().filter_map(|&row| {
        let label = labels[row].as_deref()?;
        ys[row].filter(|y| y.is_finite()).map(|_| (row, label))
    });

    Ok(ordered_groups(keyed)
        .into_iter()
        .map(|(label, members)| {
            let values = members.iter().filter_map(|&row| ys[row]).collect();
            (label, values)
        })
        .collect())
}

fn grouped_means(dataset: &Dataset, x_col: &str, y_col: &str, rows: &[usize]) -> ApiResult<SeriesData> {
    let (labels, values): (Vec<String>, Vec<Option<f64>>) = y_by_label(dataset, x_col, y_col, rows)?
        .into_iter()
        .map(|(label, ys)| {
            let mean = if ys.is_empty() {
                None
            } else {
                Some(ys.iter().sum::<f64>() / ys.len() as f64)
            };
            (label, mean)
        })
        .unzip();
    Ok(SeriesData::Grouped { labels, values })
}

fn points(dataset: &Dataset, x_col: &str, y_col: &str, rows: &[usize]) -> ApiResult<SeriesData> {
    let xs = dataset.float_values(x_col)?;
    let ys = dataset.float_values(y_col)?;

    let (x, y): (Vec<f64>, Vec<f64>) = rows
        .iter()
        .filter_map(|&row| match (xs[row], ys[row]) {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((x, y)),
            _ => None,
        })
        .unzip();
    Ok(SeriesData::Points { x, y })
}

/// Equal-width bins, bin count by Sturges' rule
fn bins(dataset: &Dataset, x_col: &str, rows: &[usize]) -> ApiResult<SeriesData> {
    let xs = dataset.float_values(x_col)?;
    let values: Vec<f64> = rows
        .iter()
        .filter_map(|&row| xs[row])
        .filter(|x| x.is_finite())
        .collect();

    if values.is_empty() {
        return Ok(SeriesData::Bins {
            edges: Vec::new(),
            counts: Vec::new(),
        });
    }

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = max - min;

    if width == 0.0 {
        return Ok(SeriesData::Bins {
            edges: vec![min, max],
            counts: vec![values.len()],
        });
    }

    let bin_count = (values.len() as f64).log2().ceil() as usize + 1;
    let step = width / bin_count as f64;
    let edges: Vec<f64> = (0..=bin_count).map(|i| min + step * i as f64).collect();

    let mut counts = vec![0usize; bin_count];
    for value in values {
        // last bin is closed on the right
        let slot = (((value - min) / step) as usize).min(bin_count - 1);
        counts[slot] += 1;
    }

    Ok(SeriesData::Bins { edges, counts })
}

fn boxes(dataset: &Dataset, x_col: &str, y_col: &str, rows: &[usize]) -> ApiResult<SeriesData> {
    let mut labels = Vec::new();
    let mut boxes = Vec::new();

    for (label, ys) in y_by_label(dataset, x_col, y_col, rows)? {
        if let Some(summary) = five_number_summary(ys)? {
            labels.push(label);
            boxes.push(summary);
        }
    }
    Ok(SeriesData::Boxes { labels, boxes })
}

fn five_number_summary(values: Vec<f64>) -> ApiResult<Option<FiveNumberSummary>> {
    let values = Float64Chunked::from_vec("y".into(), values);
    let quantile = |q: f64| values.quantile(q, QuantileMethod::Linear);

    let summary = match (values.min(), quantile(0.25)?, values.median(), quantile(0.75)?, values.max()) {
        (Some(min), Some(q1), Some(median), Some(q3), Some(max)) => Some(FiveNumberSummary {
            min,
            q1,
            median,
            q3,
            max,
        }),
        _ => None,
    };
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::{id_value, with_gaps};

    fn sales() -> Dataset {
        let frame = df!(
            "region" => ["north", "south", "north", "south", "east"],
            "units" => [10.0f64, 4.0, 20.0, 6.0, 7.0],
            "channel" => ["web", "web", "store", "web", "store"],
        )
        .unwrap();
        Dataset::new(frame)
    }

    fn chart(chart_type: ChartType, x: &str, y: Option<&str>, hue: Option<&str>) -> ChartSpec {
        ChartSpec::new(chart_type, x, y.map(String::from), hue.map(String::from))
    }

    #[test]
    fn test_bar_means_in_first_seen_order() {
        let data = build_chart(&sales(), &chart(ChartType::Bar, "region", Some("units"), None)).unwrap();
        assert_eq!(data.series.len(), 1);
        match &data.series[0].data {
            SeriesData::Grouped { labels, values } => {
                assert_eq!(labels, &vec!["north", "south", "east"]);
                assert_eq!(values, &vec![Some(15.0), Some(5.0), Some(7.0)]);
            }
            other => panic!("expected grouped, got {other:?}"),
        }
    }

    #[test]
    fn test_hue_splits_series() {
        let data = build_chart(
            &sales(),
            &chart(ChartType::Line, "region", Some("units"), Some("channel")),
        )
        .unwrap();
        let names: Vec<_> = data.series.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec![Some("web".to_string()), Some("store".to_string())]);
    }

    #[test]
    fn test_histogram_sturges_bins() {
        let data = build_chart(&id_value(), &chart(ChartType::Histogram, "id", None, None)).unwrap();
        match &data.series[0].data {
            SeriesData::Bins { edges, counts } => {
                // ceil(log2(5)) + 1 = 4
                assert_eq!(counts.len(), 4);
                assert_eq!(edges.len(), 5);
                assert_eq!(counts.iter().sum::<usize>(), 5);
                assert_eq!(edges[0], 1.0);
                assert_eq!(edges[4], 5.0);
            }
            other => panic!("expected bins, got {other:?}"),
        }
    }

    #[test]
    fn test_box_five_numbers() {
        let data = build_chart(&id_value(), &chart(ChartType::Box, "id", Some("value"), None))
            .unwrap();
        match &data.series[0].data {
            SeriesData::Boxes { labels, boxes } => {
                assert_eq!(labels.len(), 5);
                assert_eq!(boxes[3].max, 1000.0);
            }
            other => panic!("expected boxes, got {other:?}"),
        }
    }

    #[test]
    fn test_scatter_skips_missing_pairs() {
        let frame = df!(
            "a" => [Some(1.0f64), None, Some(3.0)],
            "b" => [Some(2.0f64), Some(5.0), Some(f64::NAN)],
        )
        .unwrap();
        let data = build_chart(&Dataset::new(frame), &chart(ChartType::Scatter, "a", Some("b"), None))
            .unwrap();
        match &data.series[0].data {
            SeriesData::Points { x, y } => {
                assert_eq!(x, &vec![1.0]);
                assert_eq!(y, &vec![2.0]);
            }
            other => panic!("expected points, got {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors() {
        let err = build_chart(&sales(), &chart(ChartType::Bar, "nope", Some("gone"), None)).unwrap_err();
        assert!(matches!(err, ApiError::InvalidColumn(ref cols) if cols.len() == 2));

        let err = build_chart(&sales(), &chart(ChartType::Bar, "region", Some(""), None)).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter(_)));

        let err = build_chart(&with_gaps(), &chart(ChartType::Histogram, "city", None, None)).unwrap_err();
        assert!(matches!(err, ApiError::TypeMismatch { .. }));

        assert!(matches!("pie".parse::<ChartType>(), Err(ApiError::InvalidMethod(_))));
    }
}
