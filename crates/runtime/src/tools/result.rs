//! The payload a tool hands back to the model.

use super::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key that marks a result as a failure.
pub const ERROR_KEY: &str = "error";

/// A flat key/value result returned by a tool.
///
/// A result is either a success payload with tool-specific keys, or carries an
/// [`ERROR_KEY`] entry with a human-readable message. Context keys (such as
/// the city that was looked up) may accompany an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResult(Map<String, Value>);

impl ToolResult {
    /// Build a success result from any serializable payload.
    ///
    /// Payloads that do not serialize to a JSON object become an error result.
    pub fn success<T: Serialize>(payload: &T) -> Self {
        match serde_json::to_value(payload) {
            Ok(Value::Object(map)) if !map.contains_key(ERROR_KEY) => Self(map),
            Ok(_) => Self::error("Tool produced a result that is not a key/value payload."),
            Err(e) => Self::error(format!("Tool produced an unserializable result: {e}")),
        }
    }

    /// Build an error result.
    pub fn error(message: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(ERROR_KEY.to_string(), Value::String(message.into()));
        Self(map)
    }

    /// Render a dispatch fault as an error result.
    pub fn from_error(err: &ToolError) -> Self {
        Self::error(err.to_string())
    }

    /// Attach a context key. Does not overwrite the error message.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        if key != ERROR_KEY {
            self.0.insert(key, value.into());
        }
        self
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key(ERROR_KEY)
    }

    /// The error message, if this is a failure.
    pub fn error_message(&self) -> Option<&str> {
        self.0.get(ERROR_KEY).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

impl std::fmt::Display for ToolResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

impl From<Map<String, Value>> for ToolResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
