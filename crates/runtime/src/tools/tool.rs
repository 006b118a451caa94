//! Tool capability trait.

use super::ToolResult;
use crate::model::{ParamSpec, ToolSpec};
use async_trait::async_trait;
use serde_json::{Map, Value};

static NULL: Value = Value::Null;

/// Trait for a tool the model may call.
///
/// Implementations never fail: every outcome, including upstream errors,
/// is expressed as a [`ToolResult`].
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's name, description and declared parameters.
    fn spec(&self) -> &ToolSpec;

    /// Run the tool with its declared parameters.
    async fn invoke(&self, args: &ToolArguments) -> ToolResult;
}

/// Declared parameters pulled out of the model's raw argument map.
///
/// Every declared parameter has an entry; absent ones hold `null`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArguments {
    values: Vec<(String, Value)>,
}

impl ToolArguments {
    /// Extract `params` by name from `raw`, in declaration order.
    pub fn extract(params: &[ParamSpec], raw: &Map<String, Value>) -> Self {
        let values = params
            .iter()
            .map(|p| (p.name.clone(), raw.get(&p.name).cloned().unwrap_or(Value::Null)))
            .collect();
        Self { values }
    }

    /// The value for `name`, `null` when absent.
    pub fn get(&self, name: &str) -> &Value {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map_or(&NULL, |(_, v)| v)
    }

    /// The value for `name` as trimmed, non-empty text.
    ///
    /// Numbers and booleans are rendered as text; null, blank strings and
    /// structured values yield `None`.
    pub fn text(&self, name: &str) -> Option<String> {
        let text = match self.get(name) {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Vec<ParamSpec> {
        vec![ParamSpec::string("city", "City name")]
    }

    #[test]
    fn missing_param_is_null() {
        let args = ToolArguments::extract(&params(), &Map::new());
        assert_eq!(args.len(), 1);
        assert_eq!(args.get("city"), &Value::Null);
        assert_eq!(args.text("city"), None);
    }

    #[test]
    fn undeclared_keys_are_dropped() {
        let raw = json!({"city": "Oslo", "units": "imperial"});
        let args = ToolArguments::extract(&params(), raw.as_object().unwrap());
        assert_eq!(args.iter().count(), 1);
        assert_eq!(args.get("units"), &Value::Null);
    }

    #[test]
    fn text_coerces_scalars() {
        let spec = vec![ParamSpec::string("symbol", "Ticker")];
        let raw = json!({"symbol": 7203});
        let args = ToolArguments::extract(&spec, raw.as_object().unwrap());
        assert_eq!(args.text("symbol").as_deref(), Some("7203"));

        let raw = json!({"symbol": "   "});
        let args = ToolArguments::extract(&spec, raw.as_object().unwrap());
        assert_eq!(args.text("symbol"), None);
    }
}
