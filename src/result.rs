//! The ok/ko envelope returned to callers.

use serde::Serialize;
use serde_json::Value;

pub const RESULT_OK: &str = "ok";
pub const RESULT_KO: &str = "ko";

/// Name of the envelope field holding flattened messages; the builder
/// also accepts envelopes back through this field.
pub const MESSAGES_PROPERTY: &str = "messages";

/// Result envelope: `result` is `"ok"` or `"ko"`, `messages` holds
/// produced messages (flat or rebuilt trees, or an informational string),
/// `errors` holds validation/processing error strings.
#[derive(Debug, Clone, Serialize)]
pub struct TicResult {
    pub result: String,
    pub messages: Vec<Value>,
    pub errors: Vec<String>,
}

impl TicResult {
    pub fn new() -> Self {
        TicResult {
            result: String::new(),
            messages: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        let mut r = Self::new();
        r.set_ok();
        r
    }

    pub fn ko() -> Self {
        let mut r = Self::new();
        r.set_ko();
        r
    }

    pub fn set_ok(&mut self) {
        self.result = RESULT_OK.to_string();
    }

    pub fn set_ko(&mut self) {
        self.result = RESULT_KO.to_string();
    }

    pub fn is_ok(&self) -> bool {
        self.result == RESULT_OK
    }

    pub fn add_message(&mut self, message: Value) {
        self.messages.push(message);
    }

    pub fn add_text_message(&mut self, message: impl Into<String>) {
        self.messages.push(Value::String(message.into()));
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for TicResult {
    fn default() -> Self {
        Self::new()
    }
}
