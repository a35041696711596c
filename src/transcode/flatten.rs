//! The path-encoding flattener.
//!
//! Turns a tree-form message into a single-level map whose dotted keys
//! encode the structure: marker-prefixed segments for array membership
//! and element identity, key-field values folded into the path for
//! classification fields. The encoding is the contract shared with the
//! builder, which reverses it.

use crate::config::TicConfig;
use crate::error::TicError;
use crate::node;
use serde_json::{Map, Value};
use tracing::debug;

/// Flat path -> value mapping for one message.
pub type FlatMessage = Map<String, Value>;

/// Flattens tree-form messages using one key-field configuration.
pub struct Flattener<'a> {
    config: &'a TicConfig,
}

impl<'a> Flattener<'a> {
    pub fn new(config: &'a TicConfig) -> Self {
        Flattener { config }
    }

    /// Flatten one message. `id_field` overrides the configured array-id
    /// field for this call.
    pub fn flatten(
        &self,
        message: &Value,
        id_field: Option<&str>,
    ) -> Result<FlatMessage, TicError> {
        let obj = message.as_object().ok_or(TicError::RootNotObject)?;
        let id_field = self.config.id_field_or(id_field);
        let mut flat = FlatMessage::new();
        self.flatten_into(&mut flat, obj, id_field, "");
        Ok(flat)
    }

    fn flatten_into(
        &self,
        flat: &mut FlatMessage,
        current: &Map<String, Value>,
        id_field: &str,
        path: &str,
    ) {
        let key_prefix = self.key_field_prefix(current);
        let has_timestamp = node::has(current, "timestamp");

        for (key, value) in current {
            match value {
                Value::Object(child) => {
                    self.flatten_into(flat, child, id_field, &format!("{path}{key_prefix}{key}."));
                }
                Value::Array(items) => {
                    self.flatten_array(flat, key, items, id_field, path, &key_prefix);
                }
                _ => {
                    // Key-field values of an observation already live in
                    // the path; emitting them again would duplicate them
                    if !has_timestamp || !self.config.is_field_to_path(key) {
                        insert_flat(flat, format!("{path}{key_prefix}{key}"), value.clone());
                    }
                }
            }
        }
    }

    fn flatten_array(
        &self,
        flat: &mut FlatMessage,
        key: &str,
        items: &[Value],
        id_field: &str,
        path: &str,
        key_prefix: &str,
    ) {
        let single = items.len() == 1;
        let mut has_scalar_items = false;

        for item in items {
            match item {
                Value::Object(elem) => {
                    // Precedence: element id, then bare marker for
                    // elements with no key fields of their own, then the
                    // key-field prefix alone.
                    let segment = if !single && node::has(elem, id_field) {
                        let id = node::get_str(elem, id_field).unwrap_or_default();
                        format!("{}{id}.{key_prefix}", self.config.marker_id)
                    } else if self.key_field_prefix(elem).is_empty() {
                        format!("{}.{key_prefix}", self.config.marker_id)
                    } else {
                        key_prefix.to_string()
                    };
                    self.flatten_into(flat, elem, id_field, &format!("{path}{key}.{segment}"));
                }
                _ => has_scalar_items = true,
            }
        }

        // Scalar arrays are carried whole, unless the field itself was
        // absorbed into a key-field prefix
        if has_scalar_items && !self.config.is_field_to_path(key) {
            insert_flat(
                flat,
                format!("{path}{key_prefix}{key}"),
                Value::Array(items.to_vec()),
            );
        }
    }

    /// Key-field prefix of one object: for observations (objects carrying
    /// a `timestamp`), each configured field present contributes its
    /// lower-cased value, wrapped in the key-field marker when the field
    /// is open.
    fn key_field_prefix(&self, current: &Map<String, Value>) -> String {
        let mut prefix = String::new();
        if !node::has(current, "timestamp") {
            return prefix;
        }
        for field in &self.config.fields_to_path {
            if let Some(value) = node::get_str(current, field) {
                if self.config.is_open(field) {
                    let m = &self.config.marker_key_field;
                    prefix.push_str(&format!("{m}{field}{m}"));
                }
                prefix.push_str(&value.to_lowercase());
                prefix.push('.');
            }
        }
        prefix
    }
}

fn insert_flat(flat: &mut FlatMessage, key: String, value: Value) {
    if let Some(previous) = flat.insert(key.clone(), value) {
        // Cannot happen for well-formed input; keep the last write
        debug!(%key, %previous, "flat key collision");
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
        let mut rules = ValueRules::new();
        rules.set_values("pom", "hoist|gantry|trolley");
        TicConfig::new(raw, &rules).unwrap()
    }

    #[test]
    fn test_scenario_open_key_field() {
        // An observation's open key field moves into the path, wrapped in
        // the key-field marker, and is not emitted again as a leaf
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({"timestamp": "t1", "phase": "A", "value": 10});

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("%phase%a.value"), Some(&json!(10)));
        assert_eq!(flat.get("%phase%a.timestamp"), Some(&json!("t1")));
        assert_eq!(flat.len(), 2);
    }

    #[test]
    fn test_close_key_field_is_bare() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({"timestamp": "t1", "pom": "hoist", "value": 10});

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("hoist.value"), Some(&json!(10)));
    }

    #[test]
    fn test_key_fields_follow_configured_order() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "timestamp": "t1",
            "phase": "l1",
            "pom": "hoist",
            "value": 1
        });

        let flat = flattener.flatten(&message, None).unwrap();
        // pom is configured before phase
        assert!(flat.contains_key("hoist.%phase%l1.value"));
    }

    #[test]
    fn test_multi_element_array_uses_element_ids() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [
                {"arrayid": "a", "timestamp": "t1", "value": 1},
                {"arrayid": "b", "timestamp": "t1", "value": 2}
            ]
        });

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("energy.$a.value"), Some(&json!(1)));
        assert_eq!(flat.get("energy.$b.value"), Some(&json!(2)));
        assert_eq!(flat.get("energy.$a.arrayid"), Some(&json!("a")));
    }

    #[test]
    fn test_unkeyed_elements_get_bare_marker() {
        // Scenario: identical elements distinguished only by timestamp
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [
                {"timestamp": "t1", "value": 1},
                {"timestamp": "t2", "value": 2}
            ]
        });

        let flat = flattener.flatten(&message, None).unwrap();
        // Both collapse onto the bare id marker; last write stands
        assert!(flat.contains_key("energy.$.value"));
        assert!(flat.contains_key("energy.$.timestamp"));
    }

    #[test]
    fn test_elements_disambiguated_by_key_fields_alone() {
        // Scenario: no ids, distinct phases
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [
                {"timestamp": "t1", "phase": "l1", "value": 1},
                {"timestamp": "t1", "phase": "l2", "value": 2}
            ]
        });

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("energy.%phase%l1.value"), Some(&json!(1)));
        assert_eq!(flat.get("energy.%phase%l2.value"), Some(&json!(2)));
    }

    #[test]
    fn test_id_wins_over_key_fields() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [
                {"arrayid": "a", "timestamp": "t1", "phase": "l1", "value": 1},
                {"arrayid": "b", "timestamp": "t1", "phase": "l2", "value": 2}
            ]
        });

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("energy.$a.%phase%l1.value"), Some(&json!(1)));
        assert_eq!(flat.get("energy.$b.%phase%l2.value"), Some(&json!(2)));
    }

    #[test]
    fn test_single_element_array_skips_id() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [{"arrayid": "a", "timestamp": "t1", "phase": "l1", "value": 1}]
        });

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("energy.%phase%l1.value"), Some(&json!(1)));
    }

    #[test]
    fn test_scalar_array_is_kept_whole() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({"tags": ["a", "b"], "nested": {"codes": [1, 2]}});

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(flat.get("nested.codes"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_id_field_override() {
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({
            "energy": [
                {"slot": "x", "timestamp": "t1", "value": 1},
                {"slot": "y", "timestamp": "t1", "value": 2}
            ]
        });

        let flat = flattener.flatten(&message, Some("slot")).unwrap();
        assert!(flat.contains_key("energy.$x.value"));
        assert!(flat.contains_key("energy.$y.value"));
    }

    #[test]
    fn test_non_object_root_is_an_error() {
        let config = config();
        let flattener = Flattener::new(&config);
        assert!(matches!(
            flattener.flatten(&json!([1, 2]), None),
            Err(TicError::RootNotObject)
        ));
    }

    #[test]
    fn test_no_key_fields_without_timestamp() {
        // Only observations contribute key fields to the path
        let config = config();
        let flattener = Flattener::new(&config);
        let message = json!({"phase": "l1", "value": 10});

        let flat = flattener.flatten(&message, None).unwrap();
        assert_eq!(flat.get("value"), Some(&json!(10)));
        assert_eq!(flat.get("phase"), Some(&json!("l1")));
    }
}
