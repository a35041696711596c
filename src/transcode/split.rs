//! Splitting one tree-form message into independent sub-messages.
//!
//! A message can bundle readings for several timestamps; downstream
//! consumers want one message per distinct timestamp. An optional second
//! split duplicates the message along a structural path so that each
//! element of an addressed array ends up in its own message.
//!
//! Inputs are never mutated: every sub-message starts as a deep copy of
//! the original and is pruned afterwards.

use crate::node;
use crate::time;
use serde_json::{Map, Value};
use tracing::warn;

/// Split `message` by distinct value of `field` and, if given, by the
/// dotted structural `path`.
pub fn split(message: &Value, field: &str, path: Option<&str>) -> Vec<Value> {
    let by_field = split_by_key(message, field);
    match path {
        Some(p) => by_field
            .iter()
            .flat_map(|m| split_by_path(m, p))
            .collect(),
        None => by_field,
    }
}

/// One message per distinct value of `field` anywhere in the tree.
///
/// Each copy keeps only the content whose `field` matches its value:
/// mismatching array elements are dropped, mismatching plain object
/// children lose the field but stay in place, and containers left empty
/// by the pruning are removed. When splitting by `timestamp`, objects
/// carrying a `starttimestamp`/`endtimestamp` range instead of a point
/// stamp are kept wherever the range contains the sub-message's
/// timestamp. A message without the field at all comes back unchanged as
/// a single implicit message.
pub fn split_by_key(message: &Value, field: &str) -> Vec<Value> {
    let values = node::collect_values(message, field);
    if values.is_empty() {
        return vec![message.clone()];
    }

    values
        .into_iter()
        .map(|value| {
            let mut copy = message.clone();
            if let Value::Object(obj) = &mut copy {
                prune_mismatched(obj, field, &value);
            }
            node::remove_empty(&mut copy);
            copy
        })
        .collect()
}

/// Drop content whose `field` holds a value other than `keep`.
fn prune_mismatched(obj: &mut Map<String, Value>, field: &str, keep: &str) {
    for (_, child) in obj.iter_mut() {
        match child {
            Value::Object(child_obj) => {
                if mismatches(child_obj, field, keep) {
                    child_obj.remove(field);
                } else {
                    prune_mismatched(child_obj, field, keep);
                }
            }
            Value::Array(items) => {
                items.retain_mut(|item| match item {
                    Value::Object(elem) => {
                        if mismatches(elem, field, keep) {
                            false
                        } else {
                            prune_mismatched(elem, field, keep);
                            true
                        }
                    }
                    _ => true,
                });
            }
            _ => {}
        }
    }
}

fn mismatches(obj: &Map<String, Value>, field: &str, keep: &str) -> bool {
    match node::get_str(obj, field) {
        Some(value) => value != keep,
        // Range-tagged objects follow the sub-messages whose timestamp
        // their range contains
        None => {
            field == "timestamp" && time::has_timestamp_range(obj) && !time::in_range(obj, keep)
        }
    }
}

/// One message per element of every array along the dotted `path`.
///
/// Walking the path, each array encountered clones the whole message once
/// per element, replacing the array with a singleton holding just that
/// element; plain objects are walked through without duplication. A path
/// segment missing from the tree yields the message unchanged.
pub fn split_by_path(message: &Value, path: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let Some(obj) = message.as_object() else {
        warn!("split_by_path: message root is not an object");
        return messages;
    };
    let steps: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
    if steps.is_empty() {
        messages.push(message.clone());
        return messages;
    }
    duplicate_by_path(message, obj, "", &steps, &mut messages);
    messages
}

fn duplicate_by_path(
    message: &Value,
    current: &Map<String, Value>,
    walked: &str,
    steps: &[&str],
    messages: &mut Vec<Value>,
) {
    let step = steps[0];
    match current.get(step) {
        Some(Value::Object(child)) => {
            if steps.len() > 1 {
                duplicate_by_path(
                    message,
                    child,
                    &format!("{walked}{step}."),
                    &steps[1..],
                    messages,
                );
            } else {
                // Path ends on a plain object: nothing to duplicate
                messages.push(message.clone());
            }
        }
        Some(Value::Array(items)) => {
            for item in items {
                let mut duplicate = message.clone();
                let singleton = Value::Array(vec![item.clone()]);
                replace_element(&mut duplicate, singleton, &format!("{walked}{step}"));
                if steps.len() > 1 {
                    if let Value::Object(elem) = item {
                        duplicate_by_path(
                            &duplicate,
                            elem,
                            &format!("{walked}{step}."),
                            &steps[1..],
                            messages,
                        );
                    }
                } else {
                    messages.push(duplicate);
                }
            }
        }
        _ => {
            // Path not present here; the message passes through whole
            messages.push(message.clone());
        }
    }
}

/// Replace the value at the dotted `path` of literal field names.
/// Singleton arrays along the way are walked into their only element.
fn replace_element(current: &mut Value, replacement: Value, path: &str) {
    let Some((step, rest)) = split_first_step(path) else {
        return;
    };
    let Some(obj) = current.as_object_mut() else {
        return;
    };
    if rest.is_empty() {
        obj.insert(step.to_string(), replacement);
        return;
    }
    match obj.get_mut(step) {
        Some(child @ Value::Object(_)) => replace_element(child, replacement, rest),
        Some(Value::Array(items)) if items.len() == 1 => {
            replace_element(&mut items[0], replacement, rest)
        }
        _ => {}
    }
}

fn split_first_step(path: &str) -> Option<(&str, &str)> {
    if path.is_empty() {
        return None;
    }
    match path.split_once('.') {
        Some((step, rest)) => Some((step, rest)),
        None => Some((path, "")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "msg": {"device": "crane01"},
            "crane": {
                "spreader": {
                    "energy": [
                        {"timestamp": "t1", "phase": "l1", "value": 10},
                        {"timestamp": "t1", "phase": "l2", "value": 20},
                        {"timestamp": "t2", "phase": "l1", "value": 30}
                    ]
                }
            }
        })
    }

    #[test]
    fn test_split_by_timestamp() {
        let messages = split_by_key(&sample(), "timestamp");
        assert_eq!(messages.len(), 2);

        // Sorted distinct values: t1 first
        let t1 = &messages[0]["crane"]["spreader"]["energy"];
        assert_eq!(t1.as_array().unwrap().len(), 2);
        let t2 = &messages[1]["crane"]["spreader"]["energy"];
        assert_eq!(t2.as_array().unwrap().len(), 1);
        assert_eq!(t2[0]["value"], json!(30));

        // Metadata survives in every copy
        assert_eq!(messages[0]["msg"]["device"], json!("crane01"));
    }

    #[test]
    fn test_split_without_discriminator_is_identity() {
        let message = json!({"crane": {"status": "idle"}});
        let messages = split_by_key(&message, "timestamp");
        assert_eq!(messages, vec![message]);
    }

    #[test]
    fn test_split_strips_field_from_plain_objects() {
        let message = json!({
            "a": {"timestamp": "t1", "value": 1},
            "b": {"timestamp": "t2", "value": 2}
        });
        let messages = split_by_key(&message, "timestamp");
        assert_eq!(messages.len(), 2);

        // The t1 copy keeps b in place but without its timestamp
        assert_eq!(
            messages[0],
            json!({"a": {"timestamp": "t1", "value": 1}, "b": {"value": 2}})
        );
    }

    #[test]
    fn test_split_removes_emptied_containers() {
        let message = json!({
            "readings": [
                {"timestamp": "t1", "value": 1},
                {"timestamp": "t2", "value": 2}
            ]
        });
        let messages = split_by_key(&message, "timestamp");
        assert_eq!(messages[0]["readings"].as_array().unwrap().len(), 1);
        assert_eq!(messages[1]["readings"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_range_tagged_elements_follow_their_range() {
        let message = json!({
            "readings": [
                {"timestamp": "2026-03-01T10:00:00Z", "value": 1},
                {"timestamp": "2026-03-01T12:00:00Z", "value": 2},
                {
                    "starttimestamp": "2026-03-01T09:00:00Z",
                    "endtimestamp": "2026-03-01T11:00:00Z",
                    "total": 5
                }
            ]
        });
        let messages = split_by_key(&message, "timestamp");
        assert_eq!(messages.len(), 2);

        // The ranged total accompanies only the 10:00 reading
        assert_eq!(messages[0]["readings"].as_array().unwrap().len(), 2);
        assert_eq!(messages[1]["readings"].as_array().unwrap().len(), 1);
        assert_eq!(messages[1]["readings"][0]["value"], json!(2));
    }

    #[test]
    fn test_input_is_not_mutated() {
        let message = sample();
        let before = message.clone();
        let _ = split(&message, "timestamp", Some("crane.spreader.energy"));
        assert_eq!(message, before);
    }

    #[test]
    fn test_split_by_path_duplicates_per_element() {
        let message = json!({
            "crane": {
                "motors": [
                    {"name": "hoist"},
                    {"name": "gantry"}
                ]
            }
        });
        let messages = split_by_path(&message, "crane.motors");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["crane"]["motors"], json!([{"name": "hoist"}]));
        assert_eq!(messages[1]["crane"]["motors"], json!([{"name": "gantry"}]));
    }

    #[test]
    fn test_split_by_nested_path() {
        let message = json!({
            "crane": {
                "motors": [
                    {"name": "hoist", "phases": [{"id": "l1"}, {"id": "l2"}]},
                    {"name": "gantry", "phases": [{"id": "l1"}]}
                ]
            }
        });
        let messages = split_by_path(&message, "crane.motors.phases");
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["crane"]["motors"][0]["name"], json!("hoist"));
        assert_eq!(
            messages[0]["crane"]["motors"][0]["phases"],
            json!([{"id": "l1"}])
        );
        assert_eq!(messages[2]["crane"]["motors"][0]["name"], json!("gantry"));
    }

    #[test]
    fn test_split_by_missing_path_passes_through() {
        let message = json!({"crane": {"status": "idle"}});
        let messages = split_by_path(&message, "crane.motors");
        assert_eq!(messages, vec![message]);
    }

    #[test]
    fn test_combined_split() {
        let messages = split(&sample(), "timestamp", Some("crane.spreader.energy"));
        // t1 has two elements, t2 has one
        assert_eq!(messages.len(), 3);
        for m in &messages {
            assert_eq!(
                m["crane"]["spreader"]["energy"].as_array().unwrap().len(),
                1
            );
        }
    }
}
