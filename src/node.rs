//! Helpers over the `serde_json` node model.
//!
//! Everything in the crate traverses plain `serde_json::Value` trees; these
//! are the shared primitives for null-aware field access, scalar rendering,
//! distinct-value collection and empty-container cleanup.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// True if `obj` carries `key` with a non-null value.
pub fn has(obj: &Map<String, Value>, key: &str) -> bool {
    matches!(obj.get(key), Some(v) if !v.is_null())
}

/// Render a scalar as a bare string: string content without quotes,
/// numbers and booleans via their display form. Containers and null
/// yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
    }
}

/// Field of `obj` rendered as a string, if present, non-null and scalar.
pub fn get_str(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(scalar_to_string)
}

/// Distinct scalar values found anywhere under fields named `key`,
/// in sorted order.
pub fn collect_values(message: &Value, key: &str) -> BTreeSet<String> {
    let mut values = BTreeSet::new();
    collect_values_into(message, key, &mut values);
    values
}

fn collect_values_into(node: &Value, key: &str, values: &mut BTreeSet<String>) {
    match node {
        Value::Object(obj) => {
            for (field, child) in obj {
                match child {
                    Value::Object(_) | Value::Array(_) => collect_values_into(child, key, values),
                    _ => {
                        if field == key {
                            if let Some(s) = scalar_to_string(child) {
                                values.insert(s);
                            }
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_values_into(item, key, values);
            }
        }
        _ => {}
    }
}

/// Remove null fields, empty arrays and empty objects, bottom-up.
///
/// The root object itself is never removed, only emptied.
pub fn remove_empty(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            for (_, child) in obj.iter_mut() {
                remove_empty(child);
            }
            obj.retain(|_, child| !is_empty(child));
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                remove_empty(item);
            }
            items.retain(|item| !is_empty(item));
        }
        _ => {}
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(obj) => obj.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_has_ignores_null() {
        let v = json!({"a": 1, "b": null});
        let obj = v.as_object().unwrap();
        assert!(has(obj, "a"));
        assert!(!has(obj, "b"));
        assert!(!has(obj, "c"));
    }

    #[test]
    fn test_scalar_rendering() {
        assert_eq!(scalar_to_string(&json!("x")), Some("x".to_string()));
        assert_eq!(scalar_to_string(&json!(10)), Some("10".to_string()));
        assert_eq!(scalar_to_string(&json!(true)), Some("true".to_string()));
        assert_eq!(scalar_to_string(&json!(null)), None);
        assert_eq!(scalar_to_string(&json!([1])), None);
    }

    #[test]
    fn test_collect_values_is_deep_and_distinct() {
        let message = json!({
            "timestamp": "t2",
            "crane": {
                "readings": [
                    {"timestamp": "t1", "value": 1},
                    {"timestamp": "t2", "value": 2}
                ]
            }
        });

        let values = collect_values(&message, "timestamp");
        assert_eq!(
            values.into_iter().collect::<Vec<_>>(),
            vec!["t1".to_string(), "t2".to_string()]
        );
    }

    #[test]
    fn test_remove_empty_cascades() {
        let mut message = json!({
            "keep": 1,
            "gone": null,
            "inner": {"arr": [], "obj": {}},
            "list": [{"x": null}, {"y": 2}]
        });

        remove_empty(&mut message);
        assert_eq!(message, json!({"keep": 1, "list": [{"y": 2}]}));
    }
}
