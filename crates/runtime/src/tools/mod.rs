//! Tool registry, dispatch and the result contract.

mod dispatcher;
pub mod errors;
mod registry;
mod result;
mod tool;

pub use dispatcher::Dispatcher;
pub use errors::ToolError;
pub use registry::ToolRegistry;
pub use result::{ERROR_KEY, ToolResult};
pub use tool::{Tool, ToolArguments};
