//! The split-and-flatten pipeline.
//!
//! One incoming tree-form message becomes one flat message per distinct
//! timestamp (and per structural split, when requested). The reserved
//! `msg` metadata object is copied onto every sub-message, numbered with
//! a 1-based `sample` counter so consumers can tell the parts of one
//! original message apart.

use crate::config::TicConfig;
use crate::error::TicError;
use crate::transcode::flatten::{FlatMessage, Flattener};
use crate::transcode::split;
use serde_json::{Map, Value};

/// Split `message` by timestamp (and optionally by `split_path`), then
/// flatten every resulting sub-message.
pub fn flatten_messages(
    config: &TicConfig,
    message: &Value,
    id_field: Option<&str>,
    split_path: Option<&str>,
) -> Result<Vec<FlatMessage>, TicError> {
    let obj = message.as_object().ok_or(TicError::RootNotObject)?;
    let metadata = message_properties(obj);

    let sub_messages = split::split(message, "timestamp", split_path);

    let flattener = Flattener::new(config);
    let mut messages = Vec::with_capacity(sub_messages.len());
    for (i, sub) in sub_messages.into_iter().enumerate() {
        let mut sub = sub;
        if let Some(metadata) = &metadata {
            add_message_properties(&mut sub, metadata, i as u64 + 1);
        }
        messages.push(flattener.flatten(&sub, id_field)?);
    }
    Ok(messages)
}

/// The reserved `msg` metadata object, if the message carries one.
fn message_properties(obj: &Map<String, Value>) -> Option<Map<String, Value>> {
    match obj.get("msg") {
        Some(Value::Object(metadata)) => Some(metadata.clone()),
        _ => None,
    }
}

/// Ensure `message` carries the metadata object and stamp it with the
/// sample number.
fn add_message_properties(message: &mut Value, metadata: &Map<String, Value>, sample: u64) {
    let Some(obj) = message.as_object_mut() else {
        return;
    };
    let msg = obj
        .entry("msg".to_string())
        .or_insert_with(|| Value::Object(metadata.clone()));
    if let Some(msg) = msg.as_object_mut() {
        msg.insert("sample".to_string(), Value::Number(sample.into()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawConfig;
    use crate::rules::ValueRules;
    use serde_json::json;

    fn config() -> TicConfig {
        let raw = RawConfig {
            field_to_path: Some("pom,pomt,phase".into()),
            open_value_keyfields: Some("phase".into()),
            close_value_keyfields: Some("pom,pomt".into()),
            ..RawConfig::default()
        };
        TicConfig::new(raw, &ValueRules::new()).unwrap()
    }

    #[test]
    fn test_one_flat_message_per_timestamp() {
        let config = config();
        let message = json!({
            "msg": {"device": "crane01"},
            "energy": [
                {"arrayid": "a", "timestamp": "t1", "value": 1},
                {"arrayid": "a", "timestamp": "t2", "value": 2}
            ]
        });

        let messages = flatten_messages(&config, &message, None, None).unwrap();
        assert_eq!(messages.len(), 2);

        // After the split each sub-array has one element, so no id marker
        assert_eq!(messages[0].get("energy.$.value"), Some(&json!(1)));
        assert_eq!(messages[1].get("energy.$.value"), Some(&json!(2)));

        // Metadata is copied and numbered
        assert_eq!(messages[0].get("msg.device"), Some(&json!("crane01")));
        assert_eq!(messages[0].get("msg.sample"), Some(&json!(1)));
        assert_eq!(messages[1].get("msg.sample"), Some(&json!(2)));
    }

    #[test]
    fn test_structural_split_multiplies_messages() {
        let config = config();
        let message = json!({
            "crane": {
                "motors": [
                    {"name": "hoist", "timestamp": "t1", "rpm": 100},
                    {"name": "gantry", "timestamp": "t1", "rpm": 200}
                ]
            }
        });

        let messages =
            flatten_messages(&config, &message, None, Some("crane.motors")).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].get("crane.motors.$.name"), Some(&json!("hoist")));
        assert_eq!(messages[1].get("crane.motors.$.name"), Some(&json!("gantry")));
    }

    #[test]
    fn test_message_without_timestamp_passes_through() {
        let config = config();
        let message = json!({"crane": {"status": "idle"}});

        let messages = flatten_messages(&config, &message, None, None).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].get("crane.status"), Some(&json!("idle")));
    }

    #[test]
    fn test_no_metadata_no_sample() {
        let config = config();
        let message = json!({"timestamp": "t1", "value": 1});

        let messages = flatten_messages(&config, &message, None, None).unwrap();
        assert_eq!(messages.len(), 1);
        assert!(!messages[0].contains_key("msg.sample"));
    }

    #[test]
    fn test_non_object_input_is_rejected() {
        let config = config();
        assert!(matches!(
            flatten_messages(&config, &json!("nope"), None, None),
            Err(TicError::RootNotObject)
        ));
    }
}
