//! Mutation pipeline
//!
//! Every operation is a pure function of the current [`Dataset`] and its
//! typed parameters. Operations never touch the session store; they return
//! a [`Mutation`] that the store commits (new table plus action entry) or
//! discards. Validation always runs before any new table is computed.

pub mod columns;
pub mod impute;
pub mod outliers;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::dataset::Dataset;
use crate::error::ApiError;

pub use columns::remove_columns;
pub use impute::fill_missing;
pub use outliers::{detect_outliers, handle_outliers, OutlierReport};

/// Outcome of a pipeline operation
#[derive(Debug)]
pub enum Mutation<R> {
    /// New current table plus the action log entry describing it
    Applied {
        dataset: Dataset,
        action: String,
        output: R,
    },
    /// Nothing to do; the store commits nothing and logs nothing
    Unchanged { message: String, output: R },
}

impl<R> Mutation<R> {
    pub fn applied(dataset: Dataset, action: impl Into<String>, output: R) -> Self {
        Mutation::Applied {
            dataset,
            action: action.into(),
            output,
        }
    }

    pub fn unchanged(message: impl Into<String>, output: R) -> Self {
        Mutation::Unchanged {
            message: message.into(),
            output,
        }
    }

    /// The action entry, `None` for a no-op
    pub fn action(&self) -> Option<&str> {
        match self {
            Mutation::Applied { action, .. } => Some(action),
            Mutation::Unchanged { .. } => None,
        }
    }
}

/// Missing-value imputation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FillMethod {
    Mean,
    Median,
    Mode,
    Custom,
}

impl FillMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            FillMethod::Mean => "mean",
            FillMethod::Median => "median",
            FillMethod::Mode => "mode",
            FillMethod::Custom => "custom",
        }
    }
}

impl FromStr for FillMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(FillMethod::Mean),
            "median" => Ok(FillMethod::Median),
            "mode" => Ok(FillMethod::Mode),
            "custom" => Ok(FillMethod::Custom),
            _ => Err(ApiError::InvalidMethod(format!(
                "'{}' (expected mean, median, mode or custom)",
                s
            ))),
        }
    }
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outlier detection rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierMethod {
    Iqr,
    Zscore,
}

impl FromStr for OutlierMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iqr" => Ok(OutlierMethod::Iqr),
            "zscore" | "z-score" => Ok(OutlierMethod::Zscore),
            _ => Err(ApiError::InvalidMethod(format!(
                "'{}' (expected iqr or zscore)",
                s
            ))),
        }
    }
}

/// What to do with previously detected outlier rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutlierAction {
    Remove,
    Cap,
    Mark,
}

impl FromStr for OutlierAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remove" => Ok(OutlierAction::Remove),
            "cap" => Ok(OutlierAction::Cap),
            "mark" => Ok(OutlierAction::Mark),
            _ => Err(ApiError::InvalidAction(format!(
                "'{}' (expected remove, cap or mark)",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods_case_insensitive() {
        assert_eq!("Mean".parse::<FillMethod>().unwrap(), FillMethod::Mean);
        assert_eq!(" custom ".parse::<FillMethod>().unwrap(), FillMethod::Custom);
        assert_eq!("ZSCORE".parse::<OutlierMethod>().unwrap(), OutlierMethod::Zscore);
        assert_eq!("cap".parse::<OutlierAction>().unwrap(), OutlierAction::Cap);
    }

    #[test]
    fn test_unknown_names_use_distinct_errors() {
        assert!(matches!(
            "average".parse::<FillMethod>(),
            Err(ApiError::InvalidMethod(_))
        ));
        assert!(matches!(
            "dbscan".parse::<OutlierMethod>(),
            Err(ApiError::InvalidMethod(_))
        ));
        assert!(matches!(
            "delete".parse::<OutlierAction>(),
            Err(ApiError::InvalidAction(_))
        ));
    }
}
