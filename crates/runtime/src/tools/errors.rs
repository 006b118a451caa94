use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Faults raised at the dispatch boundary.
///
/// These never propagate out of the dispatcher; they are rendered into a
/// [`ToolResult`](super::ToolResult) error entry instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[non_exhaustive]
pub enum ToolError {
    #[error("Unknown tool: {name}. Available tools: {}", .available.join(", "))]
    NotFound {
        name: String,
        available: Vec<String>,
    },

    #[error("Tool '{name}' failed unexpectedly: {reason}")]
    Panicked { name: String, reason: String },

    #[error("Tool '{0}' returned an empty result.")]
    EmptyResult(String),
}
