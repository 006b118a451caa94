//! Static catalog of available tools.

use super::Tool;
use crate::model::ToolSpec;
use std::sync::Arc;

/// Maps tool names to implementations.
///
/// Built once at startup and read-only afterwards, so it can be shared
/// between conversations.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A tool with the same name replaces the earlier one
    /// in place.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        let tool: Arc<dyn Tool> = Arc::new(tool);
        match self
            .tools
            .iter()
            .position(|t| t.spec().name == tool.spec().name)
        {
            Some(i) => self.tools[i] = tool,
            None => self.tools.push(tool),
        }
        self
    }

    /// Get a tool by name.
    pub fn lookup(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.spec().name == name)
            .map(|t| t.as_ref())
    }

    /// Registered names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.spec().name.as_str()).collect()
    }

    /// Specs for every registered tool, in registration order.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamSpec;
    use crate::tools::{ToolArguments, ToolResult};
    use async_trait::async_trait;

    struct Named(ToolSpec, &'static str);

    impl Named {
        fn new(name: &str, tag: &'static str) -> Self {
            Self(
                ToolSpec {
                    name: name.into(),
                    description: String::new(),
                    parameters: vec![ParamSpec::string("q", "query")],
                },
                tag,
            )
        }
    }

    #[async_trait]
    impl Tool for Named {
        fn spec(&self) -> &ToolSpec {
            &self.0
        }

        async fn invoke(&self, _args: &ToolArguments) -> ToolResult {
            ToolResult::default().with("tag", self.1)
        }
    }

    #[test]
    fn empty_registry_has_no_tools() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.lookup("anything").is_none());
    }

    #[test]
    fn lookup_and_order() {
        let registry = ToolRegistry::new()
            .with_tool(Named::new("b", "1"))
            .with_tool(Named::new("a", "2"));
        assert_eq!(registry.names(), vec!["b", "a"]);
        assert!(registry.lookup("a").is_some());
        assert!(registry.lookup("c").is_none());
    }

    #[tokio::test]
    async fn same_name_replaces_in_place() {
        let registry = ToolRegistry::new()
            .with_tool(Named::new("a", "old"))
            .with_tool(Named::new("b", "x"))
            .with_tool(Named::new("a", "new"));
        assert_eq!(registry.names(), vec!["a", "b"]);

        let tool = registry.lookup("a").unwrap();
        let result = tool.invoke(&ToolArguments::default()).await;
        assert_eq!(result.get("tag"), Some(&serde_json::json!("new")));
    }
}
