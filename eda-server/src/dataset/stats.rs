//! Statistics used by imputation and outlier handling

use std::collections::HashMap;
use std::hash::Hash;

use eda_common::sanitize::finite;
use polars::prelude::*;
use serde::Serialize;

use crate::error::ApiResult;

/// Multiplier applied to the interquartile range
pub const IQR_MULTIPLIER: f64 = 1.5;

/// Absolute z-score above which a value is an outlier
pub const ZSCORE_THRESHOLD: f64 = 3.0;

/// Quartiles and the closed interval outside of which values are outliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    pub fn from_quartiles(q1: f64, q3: f64) -> Self {
        let iqr = q3 - q1;
        Self {
            q1,
            q3,
            lower: q1 - IQR_MULTIPLIER * iqr,
            upper: q3 + IQR_MULTIPLIER * iqr,
        }
    }

    /// True when `value` lies strictly outside `[lower, upper]`
    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }

    /// Pull `value` into `[lower, upper]`; NaN passes through unchanged
    pub fn clamp(&self, value: f64) -> f64 {
        if value < self.lower {
            self.lower
        } else if value > self.upper {
            self.upper
        } else {
            value
        }
    }
}

/// Linear-interpolation quartiles of the non-missing values
///
/// `None` when the column has no non-missing values.
pub fn iqr_bounds(values: &Float64Chunked) -> ApiResult<Option<IqrBounds>> {
    let q1 = values.quantile(0.25, QuantileMethod::Linear)?;
    let q3 = values.quantile(0.75, QuantileMethod::Linear)?;
    Ok(match (q1, q3) {
        (Some(q1), Some(q3)) => Some(IqrBounds::from_quartiles(q1, q3)),
        _ => None,
    })
}

/// `(x - mean) / sample_std` per row
///
/// Missing values, and every value when the deviation is zero or
/// undefined, come back as `None`.
pub fn z_scores(values: &Float64Chunked) -> Vec<Option<f64>> {
    let mean = values.mean();
    let std = values.std(1);

    values
        .into_iter()
        .map(|value| match (value, mean, std) {
            (Some(x), Some(mean), Some(std)) => finite((x - mean) / std),
            _ => None,
        })
        .collect()
}

/// Most frequent non-missing value, ties going to the earliest row
pub fn first_mode<T, I>(values: I) -> Option<T>
where
    T: Eq + Hash,
    I: IntoIterator<Item = Option<T>>,
{
    // value -> (count, first row)
    let mut counts: HashMap<T, (usize, usize)> = HashMap::new();
    for (row, value) in values.into_iter().enumerate() {
        if let Some(value) = value {
            counts.entry(value).or_insert((0, row)).0 += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, row_a)), (_, (count_b, row_b))| {
            count_a.cmp(count_b).then(row_b.cmp(row_a))
        })
        .map(|(value, _)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(values: &[Option<f64>]) -> Float64Chunked {
        Float64Chunked::from_iter_options("v".into(), values.iter().copied())
    }

    #[test]
    fn test_iqr_bounds_linear_quartiles() {
        let values = chunked(&[Some(10.0), Some(12.0), Some(11.0), Some(1000.0), Some(9.0)]);
        let bounds = iqr_bounds(&values).unwrap().unwrap();
        assert_eq!(bounds.q1, 10.0);
        assert_eq!(bounds.q3, 12.0);
        assert_eq!(bounds.lower, 7.0);
        assert_eq!(bounds.upper, 15.0);
        assert!(bounds.is_outlier(1000.0));
        assert!(!bounds.is_outlier(15.0));
        assert!(!bounds.is_outlier(7.0));
        assert_eq!(bounds.clamp(1000.0), 15.0);
        assert_eq!(bounds.clamp(-3.0), 7.0);
        assert_eq!(bounds.clamp(11.0), 11.0);
    }

    #[test]
    fn test_iqr_bounds_interpolates() {
        // positions 0.75 and 2.25 of [1, 2, 3, 4]
        let values = chunked(&[Some(4.0), Some(1.0), Some(3.0), Some(2.0)]);
        let bounds = iqr_bounds(&values).unwrap().unwrap();
        assert!((bounds.q1 - 1.75).abs() < 1e-12);
        assert!((bounds.q3 - 3.25).abs() < 1e-12);
    }

    #[test]
    fn test_iqr_bounds_all_missing() {
        let values = chunked(&[None, None]);
        assert_eq!(iqr_bounds(&values).unwrap(), None);
    }

    #[test]
    fn test_z_scores_sample_deviation() {
        let values = chunked(&[Some(1.0), Some(2.0), Some(3.0), None]);
        let z = z_scores(&values);
        // mean 2, sample std 1
        assert_eq!(z, vec![Some(-1.0), Some(0.0), Some(1.0), None]);
    }

    #[test]
    fn test_z_scores_constant_column_is_undefined() {
        let values = chunked(&[Some(5.0), Some(5.0), Some(5.0)]);
        assert_eq!(z_scores(&values), vec![None, None, None]);
    }

    #[test]
    fn test_first_mode_tie_goes_to_first_seen() {
        let values = vec![Some("b"), Some("a"), Some("a"), Some("b"), None];
        assert_eq!(first_mode(values), Some("b"));

        let values = vec![None, Some(3), Some(1), Some(1)];
        assert_eq!(first_mode(values), Some(1));

        let empty: Vec<Option<i64>> = vec![None, None];
        assert_eq!(first_mode(empty), None);
    }
}
