//! Column removal

use super::Mutation;
use crate::dataset::Dataset;
use crate::error::{ApiError, ApiResult};

/// Drop `columns` from the table
///
/// Every name must exist; all missing names are reported together.
/// Duplicate names are collapsed. An empty request is rejected.
pub fn remove_columns(dataset: &Dataset, columns: &[String]) -> ApiResult<Mutation<()>> {
    if columns.is_empty() {
        return Err(ApiError::MissingParameter("columns".to_string()));
    }

    let mut requested: Vec<String> = Vec::with_capacity(columns.len());
    for name in columns {
        if !requested.contains(name) {
            requested.push(name.clone());
        }
    }

    let missing = dataset.missing_columns(requested.iter().map(String::as_str));
    if !missing.is_empty() {
        return Err(ApiError::InvalidColumn(missing));
    }

    let next = dataset.without_columns(&requested)?;
    let action = format!("Removed columns: {}", requested.join(", "));
    Ok(Mutation::applied(next, action, ()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::fixtures::{id_value, with_gaps};

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_remove_keeps_rows_and_logs() {
        let outcome = remove_columns(&with_gaps(), &names(&["city"])).unwrap();
        match outcome {
            Mutation::Applied {
                dataset, action, ..
            } => {
                assert_eq!(dataset.column_names(), vec!["score"]);
                assert_eq!(dataset.height(), 4);
                assert_eq!(action, "Removed columns: city");
            }
            other => panic!("expected applied, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_names_reported_together() {
        let err = remove_columns(&id_value(), &names(&["nope", "id", "gone"])).unwrap_err();
        match err {
            ApiError::InvalidColumn(missing) => assert_eq!(missing, names(&["nope", "gone"])),
            other => panic!("expected InvalidColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_second_removal_of_same_column_fails() {
        let first = match remove_columns(&id_value(), &names(&["id"])).unwrap() {
            Mutation::Applied { dataset, .. } => dataset,
            other => panic!("expected applied, got {other:?}"),
        };
        let err = remove_columns(&first, &names(&["id"])).unwrap_err();
        assert!(matches!(err, ApiError::InvalidColumn(_)));
    }

    #[test]
    fn test_empty_request_rejected() {
        let err = remove_columns(&id_value(), &[]).unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter(ref p) if p == "columns"));
    }

    #[test]
    fn test_duplicates_collapsed_and_all_columns_removable() {
        let outcome = remove_columns(&id_value(), &names(&["id", "value", "id"])).unwrap();
        assert_eq!(outcome.action(), Some("Removed columns: id, value"));
        match outcome {
            Mutation::Applied { dataset, .. } => assert_eq!(dataset.width(), 0),
            other => panic!("expected applied, got {other:?}"),
        }
    }
}
