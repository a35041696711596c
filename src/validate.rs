//! Structural validation of tree-form messages.
//!
//! Two passes feed one error list: an optional schema pass delegated to
//! an external [`SchemaValidator`], and the custom recursive pass that
//! enforces the TIC array rules — sibling array elements sharing the
//! same key-field identity must be told apart by timestamp — plus the
//! per-field scalar allow-rules.

use crate::config::TicConfig;
use crate::error::{
    ErrorCatalog, ERROR_NO_TIMESTAMP, ERROR_PROPERTY_DUPLICATED, ERROR_PROPERTY_NOT_ALLOWED_VALUE,
};
use crate::node;
use crate::result::TicResult;
use crate::rules::{SchemaValidator, ValueRules};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

const COMPLIANT_MESSAGE: &str = "The JSON file is compliant with TIC 4.0";

/// Validates tree-form messages against one configuration.
pub struct Validator<'a> {
    config: &'a TicConfig,
    rules: &'a ValueRules,
    catalog: &'a ErrorCatalog,
    schema: Option<&'a dyn SchemaValidator>,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a TicConfig, rules: &'a ValueRules, catalog: &'a ErrorCatalog) -> Self {
        Validator {
            config,
            rules,
            catalog,
            schema: None,
        }
    }

    /// Attach an external structural schema pass.
    pub fn with_schema(mut self, schema: &'a dyn SchemaValidator) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Validate one message. The envelope is `ok` with the compliance
    /// message, or `ko` carrying every collected error.
    pub fn validate(&self, message: &Value) -> TicResult {
        let mut result = TicResult::new();

        let Some(obj) = message.as_object() else {
            result.set_ko();
            result.add_error("message root must be a JSON object");
            return result;
        };

        if let Some(schema) = self.schema {
            for violation in schema.validate(message) {
                result.add_error(violation);
            }
        }

        self.validate_node(&mut result, obj, "");

        if result.has_errors() {
            result.set_ko();
        } else {
            result.set_ok();
            result.add_text_message(COMPLIANT_MESSAGE);
        }
        result
    }

    fn validate_node(&self, result: &mut TicResult, current: &Map<String, Value>, path: &str) {
        for (key, value) in current {
            match value {
                Value::Object(child) => {
                    // Objects carry no rule of their own
                    self.validate_node(result, child, &format!("{path}{key}."));
                }
                Value::Array(items) => {
                    self.validate_array(result, key, items, path);
                }
                _ => {
                    if !self.rules.allows(key, value) {
                        let rendered = node::scalar_to_string(value).unwrap_or_default();
                        result.add_error(self.catalog.get2(
                            ERROR_PROPERTY_NOT_ALLOWED_VALUE,
                            &format!("{path}{key}"),
                            &rendered,
                        ));
                    }
                }
            }
        }
    }

    fn validate_array(&self, result: &mut TicResult, key: &str, items: &[Value], path: &str) {
        // Group object elements by their composite key-field identity
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, item) in items.iter().enumerate() {
            if let Value::Object(elem) = item {
                groups
                    .entry(self.composite_key(elem))
                    .or_default()
                    .push(i);
                self.validate_node(result, elem, &format!("{path}{key}[{i}]."));
            }
        }

        for indices in groups.values() {
            if indices.len() < 2 {
                continue;
            }
            // Same identity is only legal with distinct timestamps
            let mut by_timestamp: BTreeMap<String, usize> = BTreeMap::new();
            for &i in indices {
                let Some(elem) = items[i].as_object() else {
                    continue;
                };
                match node::get_str(elem, "timestamp") {
                    Some(ts) => *by_timestamp.entry(ts).or_insert(0) += 1,
                    None => {
                        result.add_error(
                            self.catalog
                                .get1(ERROR_NO_TIMESTAMP, &format!("{path}{key}[{i}]")),
                        );
                    }
                }
            }
            for count in by_timestamp.values() {
                if *count > 1 {
                    result.add_error(
                        self.catalog
                            .get1(ERROR_PROPERTY_DUPLICATED, &format!("{path}{key}")),
                    );
                }
            }
        }
    }

    /// Composite identity of an array element: the lower-cased values of
    /// every validation key field present, in configured order.
    fn composite_key(&self, elem: &Map<String, Value>) -> String {
        let mut parts = Vec::new();
        for field in &self.config.validation_key_fields {
            if let Some(value) = node::get_str(elem, field) {
                parts.push(value.to_lowercase());
            }
        }
        format!("key_{}", parts.join("."))
    }
}
