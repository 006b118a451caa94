//! Resolves tool calls against the registry and runs them.

use super::{ToolArguments, ToolError, ToolRegistry, ToolResult};
use crate::model::ToolSpec;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// The boundary between the conversation loop and tool side effects.
///
/// [`dispatch`](Self::dispatch) always returns a well-formed [`ToolResult`];
/// nothing a tool does can fault the caller.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: ToolRegistry,
    specs: Vec<ToolSpec>,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        let specs = registry.specs();
        Self { registry, specs }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Catalog offered to the model.
    pub fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    /// Run the named tool with the model's raw arguments.
    pub async fn dispatch(&self, name: &str, args: &Map<String, Value>) -> ToolResult {
        let Some(tool) = self.registry.lookup(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return ToolResult::from_error(&ToolError::NotFound {
                name: name.to_string(),
                available: self.registry.names().into_iter().map(String::from).collect(),
            });
        };

        let arguments = ToolArguments::extract(&tool.spec().parameters, args);
        debug!(tool = name, args = ?arguments, "dispatching tool call");

        let outcome = AssertUnwindSafe(tool.invoke(&arguments))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(result) if result.is_empty() => {
                ToolResult::from_error(&ToolError::EmptyResult(name.to_string()))
            }
            Ok(result) => result,
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                error!(tool = name, %reason, "tool panicked");
                ToolResult::from_error(&ToolError::Panicked {
                    name: name.to_string(),
                    reason,
                })
            }
        };

        match result.error_message() {
            Some(message) => debug!(tool = name, error = message, "tool returned an error"),
            None => debug!(tool = name, "tool succeeded"),
        }
        result
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
