//! Helpers over dynamic attribute values.

use serde_json::Value;

/// Whether a value counts as empty: null, an empty string or an empty list.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Whether a value is a scalar (not a list or an object).
pub fn is_scalar(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

/// Render a value for message placeholders.
pub fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => value.to_string(),
    }
}

/// Numeric reading of numbers and numeric strings.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Equality the way a relational store compares a column with a bound
/// parameter: numbers match numeric strings (`"1" == 1`).
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_))
        | (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_)) => match (as_number(a), as_number(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Deduplicate values under [`loose_eq`], keeping first occurrences.
pub fn distinct(values: &[Value]) -> Vec<Value> {
    let mut seen: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        if !seen.iter().any(|s| loose_eq(s, value)) {
            seen.push(value.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_values() {
        assert!(is_empty(&Value::Null));
        assert!(is_empty(&json!("")));
        assert!(is_empty(&json!([])));
        assert!(!is_empty(&json!(" ")));
        assert!(!is_empty(&json!(0)));
        assert!(!is_empty(&json!(false)));
    }

    #[test]
    fn loose_equality_matches_numeric_strings() {
        assert!(loose_eq(&json!(1), &json!("1")));
        assert!(loose_eq(&json!(" 2 "), &json!(2.0)));
        assert!(!loose_eq(&json!("a"), &json!(1)));
        assert!(!loose_eq(&json!(true), &json!(1)));
        assert!(loose_eq(&json!("a"), &json!("a")));
    }

    #[test]
    fn distinct_collapses_loose_duplicates() {
        let values = vec![json!(1), json!("1"), json!(2), json!(2)];
        assert_eq!(distinct(&values), vec![json!(1), json!(2)]);
    }

    #[test]
    fn display_renders_scalars_plainly() {
        assert_eq!(display(&json!("TEXT")), "TEXT");
        assert_eq!(display(&json!(3)), "3");
        assert_eq!(display(&Value::Null), "");
        assert_eq!(display(&json!([1, 2])), "[1,2]");
    }
}
