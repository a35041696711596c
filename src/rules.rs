//! External collaborator seams: per-field scalar rules and the structural
//! schema pass.
//!
//! The engine does not interpret field values itself. Allowed-value rules
//! are supplied per deployment (the same tables also feed the reverse
//! value-to-field lookup used when rebuilding flat paths), and JSON-Schema
//! style structural validation is plugged in behind [`SchemaValidator`].

use crate::error::TicError;
use crate::node;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

/// Allow-rule for the scalar values of one field.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Closed enumeration of allowed values (compared lower-cased).
    OneOf(Vec<String>),
    /// Values must match this pattern in full.
    Pattern(Regex),
}

/// Per-field scalar allow-rules. Fields without a rule accept anything.
#[derive(Debug, Clone, Default)]
pub struct ValueRules {
    rules: HashMap<String, Rule>,
}

impl ValueRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an enumeration rule from a pipe-separated value list,
    /// e.g. `"l1|l2|l3"`. Empty entries are dropped.
    pub fn set_values(&mut self, field: impl Into<String>, values_inline: &str) {
        let values: Vec<String> = values_inline
            .split('|')
            .filter(|v| !v.is_empty())
            .map(|v| v.to_lowercase())
            .collect();
        self.rules.insert(field.into(), Rule::OneOf(values));
    }

    /// Register a regex rule for one field.
    pub fn set_pattern(&mut self, field: impl Into<String>, pattern: &str) -> Result<(), TicError> {
        let field = field.into();
        let re = Regex::new(&format!("^(?:{pattern})$"))
            .map_err(|e| TicError::Config(format!("bad pattern for field '{field}': {e}")))?;
        self.rules.insert(field, Rule::Pattern(re));
        Ok(())
    }

    /// True if `value` is allowed for `field`. Unknown fields and
    /// non-scalar values are allowed.
    pub fn allows(&self, field: &str, value: &Value) -> bool {
        let Some(rule) = self.rules.get(field) else {
            return true;
        };
        let Some(s) = node::scalar_to_string(value) else {
            return true;
        };
        match rule {
            Rule::OneOf(values) => values.iter().any(|v| *v == s.to_lowercase()),
            Rule::Pattern(re) => re.is_match(&s),
        }
    }

    /// Enumerated values for `field`, if it carries an enumeration rule.
    /// Feeds the reverse value-to-field map of the configuration.
    pub fn values_for(&self, field: &str) -> Option<&[String]> {
        match self.rules.get(field) {
            Some(Rule::OneOf(values)) => Some(values),
            _ => None,
        }
    }
}

/// Structural schema pass over a whole tree-form message.
///
/// Implementations are opaque to the engine; each returned string becomes
/// one entry in the validation error list.
pub trait SchemaValidator {
    fn validate(&self, message: &Value) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_enumeration_rule() {
        let mut rules = ValueRules::new();
        rules.set_values("phase", "l1|l2|l3");

        assert!(rules.allows("phase", &json!("l2")));
        assert!(rules.allows("phase", &json!("L2")));
        assert!(!rules.allows("phase", &json!("l9")));
        // Unknown field accepts anything
        assert!(rules.allows("value", &json!("whatever")));
    }

    #[test]
    fn test_pattern_rule_is_anchored() {
        let mut rules = ValueRules::new();
        rules.set_pattern("unit", "k?wh").unwrap();

        assert!(rules.allows("unit", &json!("kwh")));
        assert!(rules.allows("unit", &json!("wh")));
        assert!(!rules.allows("unit", &json!("kwhx")));
    }

    #[test]
    fn test_values_for_enumeration_only() {
        let mut rules = ValueRules::new();
        rules.set_values("pom", "brake|hoist|");
        rules.set_pattern("unit", "\\w+").unwrap();

        assert_eq!(
            rules.values_for("pom").unwrap(),
            &["brake".to_string(), "hoist".to_string()]
        );
        assert!(rules.values_for("unit").is_none());
    }
}
