//! LLM provider backends.

mod gemini;

pub use gemini::{GeminiBackend, GeminiBackendBuilder};
