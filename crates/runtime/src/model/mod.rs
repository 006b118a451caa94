//! LLM protocol types and backend trait.

pub mod errors;
pub mod types;

pub use errors::ModelError;
pub use types::{
    Backend, ModelRequest, ModelResponse, ParamKind, ParamSpec, Part, ResponsePart, Role,
    ToolCall, ToolSpec, Turn, Usage,
};
