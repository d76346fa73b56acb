//! Non-finite float sanitization
//!
//! NaN and ±Infinity have no JSON representation. Every float that leaves
//! the service passes through here and comes out as a number or `null`.

use serde::Serialize;
use serde_json::Value;

/// `Some(v)` for finite values, `None` for NaN and ±Infinity
pub fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// JSON value for a float, `null` when non-finite
pub fn float_value(value: f64) -> Value {
    finite(value)
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// Recursively replace non-finite numbers in a JSON tree with `null`
///
/// Numbers that cannot be read back as a finite `f64` are nulled; integers
/// pass through untouched.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Value::Number(n)
            } else {
                n.as_f64().map(float_value).unwrap_or(Value::Null)
            }
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, sanitize_json(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Serialize any value to JSON and sanitize the result
pub fn to_sanitized_json<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    serde_json::to_value(value).map(sanitize_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_finite_filters_nan_and_infinity() {
        assert_eq!(finite(1.5), Some(1.5));
        assert_eq!(finite(f64::NAN), None);
        assert_eq!(finite(f64::INFINITY), None);
        assert_eq!(finite(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_float_value_never_emits_nan_token() {
        assert_eq!(float_value(f64::NAN), Value::Null);
        assert_eq!(float_value(2.0), json!(2.0));
    }

    #[test]
    fn test_nested_structures_are_walked() {
        #[derive(Serialize)]
        struct Report {
            bounds: Vec<f64>,
            nested: Vec<Vec<f64>>,
            count: usize,
        }

        let report = Report {
            bounds: vec![1.0, f64::NAN],
            nested: vec![vec![f64::INFINITY, 3.0]],
            count: 2,
        };

        let value = to_sanitized_json(&report).unwrap();
        assert_eq!(value["bounds"], json!([1.0, null]));
        assert_eq!(value["nested"], json!([[null, 3.0]]));
        assert_eq!(value["count"], json!(2));

        let text = serde_json::to_string(&value).unwrap();
        assert!(!text.contains("NaN"));
        assert!(!text.contains("inf"));
    }
}
