//! Toolchat runtime: the tool-calling conversation loop.
//!
//! This crate connects a hosted language model to a fixed set of data-lookup
//! tools. The model may ask for a tool mid-conversation; the runtime runs it
//! and feeds the result back so the model can answer from live data.
//!
//! # Overview
//!
//! - **ToolRegistry** / **Dispatcher**: name → [`Tool`] lookup and the
//!   boundary that turns every tool outcome into a [`ToolResult`].
//! - **classify**: splits a model response into text and tool-call
//!   [`Fragment`]s.
//! - **ConversationLoop**: runs one exchange against a caller-owned
//!   [`Conversation`], following at most one tool call.
//! - **Backend**: the model service; [`GeminiBackend`] talks to Gemini.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{Conversation, ConversationLoop, GeminiBackend, ToolRegistry};
//!
//! # async fn example() -> runtime::Result<()> {
//! let backend = GeminiBackend::builder("api-key", "gemini-2.5-flash").build();
//! let chat = ConversationLoop::new(backend, ToolRegistry::new());
//!
//! let mut conversation = Conversation::new();
//! let exchange = chat.exchange(&mut conversation, "Hello!").await?;
//! println!("{}", exchange.reply);
//! # Ok(())
//! # }
//! ```

mod chat;
mod conversation;
mod error;
pub mod model;
pub mod providers;
pub mod tools;
mod turn;

pub use chat::{ConversationLoop, Exchange, ExchangeEvent};
pub use conversation::{Conversation, ConversationId, LoopState};
pub use error::{Error, Result};
pub use model::{
    Backend, ModelError, ModelRequest, ModelResponse, ParamKind, ParamSpec, Part, ResponsePart,
    Role, ToolCall, ToolSpec, Turn, Usage,
};
pub use providers::{GeminiBackend, GeminiBackendBuilder};
pub use tools::{Dispatcher, Tool, ToolArguments, ToolError, ToolRegistry, ToolResult};
pub use turn::{Classified, Fragment, classify};
