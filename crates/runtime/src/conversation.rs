//! Conversation state owned by the caller of the loop.

use crate::model::Turn;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub Uuid);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Where a conversation is in its current exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    #[default]
    Idle,
    AwaitingFirstResponse,
    ToolCallPending,
    AwaitingSecondResponse,
    Done,
}

/// An ordered, append-only transcript.
///
/// Only the conversation loop appends to it, and only once an exchange has
/// completed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    pub id: ConversationId,
    turns: Vec<Turn>,
    state: LoopState,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: LoopState) {
        self.state = state;
    }

    pub(crate) fn commit(&mut self, turns: Vec<Turn>) {
        self.turns.extend(turns);
    }
}
