use thiserror::Error;

/// Why a model-service call produced no usable response.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The service could not be reached, or the connection dropped.
    #[error("model service unreachable: {0}")]
    Network(String),

    /// The service answered with a non-success status.
    #[error("model service error: {0}")]
    Api(String),

    /// The service refused the prompt outright (e.g. a safety block).
    #[error("prompt blocked by the model service: {0}")]
    Blocked(String),

    /// The body was not a response we understand.
    #[error("unreadable model response: {0}")]
    InvalidResponse(String),
}
