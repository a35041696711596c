//! Error types and the validation message catalog.

use once_cell::sync::Lazy;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the transcoding engine.
///
/// Configuration errors are fatal at startup; the rest are per-operation
/// and recoverable (the builder skips the offending key, the flattener
/// rejects the whole input).
#[derive(Debug, Error)]
pub enum TicError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("message root must be a JSON object")]
    RootNotObject,

    #[error("malformed flat key '{key}': {detail}")]
    MalformedKey { key: String, detail: String },
}

pub const ERROR_PROPERTY_DUPLICATED: &str = "ERROR_PROPERTY_DUPLICATED";
pub const ERROR_NO_TIMESTAMP: &str = "ERROR_NO_TIMESTAMP";
pub const ERROR_PROPERTY_NOT_ALLOWED_VALUE: &str = "ERROR_PROPERTY_NOT_ALLOWED_VALUE";

static DEFAULT_TEMPLATES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (
            ERROR_PROPERTY_DUPLICATED,
            "The property {0} is duplicated: elements share the same key fields and timestamp",
        ),
        (
            ERROR_NO_TIMESTAMP,
            "The property {0} is repeated and has no timestamp to tell it apart",
        ),
        (
            ERROR_PROPERTY_NOT_ALLOWED_VALUE,
            "The property {0} has a value that is not allowed: {1}",
        ),
    ])
});

/// Maps an error kind plus 0-2 positional arguments to a human-readable
/// message. Ships the built-in TIC templates; deployments can override
/// any of them.
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    overrides: HashMap<String, String>,
}

impl ErrorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace or add the template for one error kind.
    pub fn set(&mut self, kind: impl Into<String>, template: impl Into<String>) {
        self.overrides.insert(kind.into(), template.into());
    }

    fn template(&self, kind: &str) -> Option<&str> {
        self.overrides
            .get(kind)
            .map(String::as_str)
            .or_else(|| DEFAULT_TEMPLATES.get(kind).copied())
    }

    /// Render `kind` with one positional argument.
    pub fn get1(&self, kind: &str, arg0: &str) -> String {
        match self.template(kind) {
            Some(t) => t.replace("{0}", arg0),
            None => format!("{kind}: {arg0}"),
        }
    }

    /// Render `kind` with two positional arguments.
    pub fn get2(&self, kind: &str, arg0: &str, arg1: &str) -> String {
        match self.template(kind) {
            Some(t) => t.replace("{0}", arg0).replace("{1}", arg1),
            None => format!("{kind}: {arg0}, {arg1}"),
        }
    }
}
