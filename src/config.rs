//! Key-field configuration.
//!
//! One immutable [`TicConfig`] value is built at process start and passed
//! by reference into every core call. It carries the ordered list of
//! fields whose values are folded into flat paths, the open/close split,
//! the validation key fields, the default array-id field and the four
//! marker strings, plus the derived lookup tables the flattener and
//! builder consult on every segment.

use crate::error::TicError;
use crate::rules::ValueRules;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

/// Raw configuration as supplied by the environment or a config file:
/// plain key to comma-separated-list pairs, using the historical TIC
/// service variable names.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawConfig {
    #[serde(rename = "FIELD_TO_PATH")]
    pub field_to_path: Option<String>,
    #[serde(rename = "OPEN_VALUE_KEYFIELDS")]
    pub open_value_keyfields: Option<String>,
    #[serde(rename = "CLOSE_VALUE_KEYFIELDS")]
    pub close_value_keyfields: Option<String>,
    #[serde(rename = "VALIDATION_KEY_FIELDS")]
    pub validation_key_fields: Option<String>,
    #[serde(rename = "FIELD_ID")]
    pub field_id: Option<String>,
    #[serde(rename = "MARKER_ID")]
    pub marker_id: Option<String>,
    #[serde(rename = "MARKER_KEYFIELD")]
    pub marker_keyfield: Option<String>,
    #[serde(rename = "MARKER_UNIT")]
    pub marker_unit: Option<String>,
    #[serde(rename = "MARKER_REFERENCE")]
    pub marker_reference: Option<String>,
}

impl RawConfig {
    /// Read the historical variable names from the process environment.
    /// Unset variables keep their defaults.
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        RawConfig {
            field_to_path: var("FIELD_TO_PATH"),
            open_value_keyfields: var("OPEN_VALUE_KEYFIELDS"),
            close_value_keyfields: var("CLOSE_VALUE_KEYFIELDS"),
            validation_key_fields: var("VALIDATION_KEY_FIELDS"),
            field_id: var("FIELD_ID"),
            marker_id: var("MARKER_ID"),
            marker_keyfield: var("MARKER_KEYFIELD"),
            marker_unit: var("MARKER_UNIT"),
            marker_reference: var("MARKER_REFERENCE"),
        }
    }

    /// Overlay `other` on top of `self`: set fields of `other` win.
    pub fn merge(mut self, other: RawConfig) -> Self {
        self.field_to_path = other.field_to_path.or(self.field_to_path);
        self.open_value_keyfields = other.open_value_keyfields.or(self.open_value_keyfields);
        self.close_value_keyfields = other.close_value_keyfields.or(self.close_value_keyfields);
        self.validation_key_fields = other.validation_key_fields.or(self.validation_key_fields);
        self.field_id = other.field_id.or(self.field_id);
        self.marker_id = other.marker_id.or(self.marker_id);
        self.marker_keyfield = other.marker_keyfield.or(self.marker_keyfield);
        self.marker_unit = other.marker_unit.or(self.marker_unit);
        self.marker_reference = other.marker_reference.or(self.marker_reference);
        self
    }
}

/// The immutable key-field configuration.
#[derive(Debug, Clone)]
pub struct TicConfig {
    /// Fields whose values are appended to the path of any object
    /// carrying a `timestamp`, in this order.
    pub fields_to_path: Vec<String>,
    /// Subset of `fields_to_path` whose contribution is wrapped in the
    /// key-field marker.
    pub open_value_key_fields: Vec<String>,
    /// Documented complement of the open fields; not consulted by the
    /// algorithms.
    pub close_value_key_fields: Vec<String>,
    /// Fields used to build the composite identity of array elements
    /// during validation.
    pub validation_key_fields: Vec<String>,
    /// Default array-element id field, overridable per call.
    pub id_field: String,

    pub marker_id: String,
    pub marker_key_field: String,
    pub marker_unit: String,
    pub marker_reference: String,

    fields_to_path_set: HashSet<String>,
    open_set: HashSet<String>,
    /// Reverse lookup: known key-field value -> field name. Built from
    /// the enumeration rules of every field in `fields_to_path`.
    path_to_field: HashMap<String, String>,
}

impl TicConfig {
    /// Build and validate a configuration. `rules` supplies the value
    /// enumerations used for the reverse value-to-field lookup.
    pub fn new(raw: RawConfig, rules: &ValueRules) -> Result<Self, TicError> {
        let list = |s: &Option<String>, default: &str| -> Vec<String> {
            s.as_deref()
                .unwrap_or(default)
                .split(',')
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty())
                .collect()
        };

        let fields_to_path = list(&raw.field_to_path, "pom,pomt,phase");
        let open_value_key_fields = list(&raw.open_value_keyfields, "phase");
        let close_value_key_fields = list(&raw.close_value_keyfields, "pom,pomt");
        let validation_key_fields =
            list(&raw.validation_key_fields, "pom,pomt,phase,unit,reference");

        let id_field = raw.field_id.unwrap_or_else(|| "arrayid".to_string());
        let marker_id = raw.marker_id.unwrap_or_else(|| "$".to_string());
        let marker_key_field = raw.marker_keyfield.unwrap_or_else(|| "%".to_string());
        let marker_unit = raw.marker_unit.unwrap_or_else(|| "&".to_string());
        let marker_reference = raw.marker_reference.unwrap_or_else(|| "#".to_string());

        let markers = [
            ("MARKER_ID", &marker_id),
            ("MARKER_KEYFIELD", &marker_key_field),
            ("MARKER_UNIT", &marker_unit),
            ("MARKER_REFERENCE", &marker_reference),
        ];
        for (name, marker) in &markers {
            if marker.is_empty() {
                return Err(TicError::Config(format!("{name} must not be empty")));
            }
        }
        for i in 0..markers.len() {
            for j in (i + 1)..markers.len() {
                if markers[i].1 == markers[j].1 {
                    return Err(TicError::Config(format!(
                        "{} and {} must be distinct, both are '{}'",
                        markers[i].0, markers[j].0, markers[i].1
                    )));
                }
            }
        }
        if fields_to_path.is_empty() {
            return Err(TicError::Config("FIELD_TO_PATH must not be empty".into()));
        }

        let mut path_to_field = HashMap::new();
        for field in &fields_to_path {
            if let Some(values) = rules.values_for(field) {
                for value in values {
                    path_to_field.insert(value.clone(), field.clone());
                }
            }
        }

        Ok(TicConfig {
            fields_to_path_set: fields_to_path.iter().cloned().collect(),
            open_set: open_value_key_fields.iter().cloned().collect(),
            fields_to_path,
            open_value_key_fields,
            close_value_key_fields,
            validation_key_fields,
            id_field,
            marker_id,
            marker_key_field,
            marker_unit,
            marker_reference,
            path_to_field,
        })
    }

    pub fn is_field_to_path(&self, field: &str) -> bool {
        self.fields_to_path_set.contains(field)
    }

    pub fn is_open(&self, field: &str) -> bool {
        self.open_set.contains(field)
    }

    /// Field owning this bare key-field value, if any.
    pub fn field_for_value(&self, value: &str) -> Option<&str> {
        self.path_to_field.get(value).map(String::as_str)
    }

    /// Per-call id field override with the configured fallback.
    pub fn id_field_or<'a>(&'a self, id_field: Option<&'a str>) -> &'a str {
        id_field.unwrap_or(&self.id_field)
    }
}
