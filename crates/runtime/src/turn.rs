//! Classification of model responses into text and tool-call fragments.

use crate::model::{ModelResponse, Part, ToolCall};

/// One piece of a model response.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Text(String),
    ToolCall(ToolCall),
}

/// The classified content of one model response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classified {
    fragments: Vec<Fragment>,
}

/// Classify each part of `response`, in order.
///
/// Non-empty text becomes [`Fragment::Text`]; otherwise a function call
/// becomes [`Fragment::ToolCall`] with its arguments untouched. Parts that
/// are neither are skipped.
pub fn classify(response: &ModelResponse) -> Classified {
    let fragments = response
        .parts
        .iter()
        .filter_map(|part| match (&part.text, &part.function_call) {
            (Some(text), _) if !text.is_empty() => Some(Fragment::Text(text.clone())),
            (_, Some(call)) => Some(Fragment::ToolCall(call.clone())),
            _ => None,
        })
        .collect();
    Classified { fragments }
}

impl Classified {
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The first tool call. Later calls in the same response are ignored.
    pub fn tool_call(&self) -> Option<&ToolCall> {
        self.fragments.iter().find_map(|f| match f {
            Fragment::ToolCall(call) => Some(call),
            Fragment::Text(_) => None,
        })
    }

    /// Number of tool calls beyond the first.
    pub fn ignored_calls(&self) -> usize {
        self.fragments
            .iter()
            .filter(|f| matches!(f, Fragment::ToolCall(_)))
            .count()
            .saturating_sub(1)
    }

    /// All text, concatenated.
    pub fn text(&self) -> String {
        self.texts(self.fragments.len())
    }

    /// Text strictly before the first tool call.
    pub fn leading_text(&self) -> String {
        self.texts(self.call_index())
    }

    /// Parts to record for the assistant turn: the leading text and the
    /// first tool call, or all text when there is no call.
    pub fn to_parts(&self) -> Vec<Part> {
        let end = self.call_index();
        let mut parts: Vec<Part> = self.fragments[..end]
            .iter()
            .filter_map(|f| match f {
                Fragment::Text(text) => Some(Part::text(text.clone())),
                Fragment::ToolCall(_) => None,
            })
            .collect();
        if let Some(call) = self.tool_call() {
            parts.push(Part::ToolCall(call.clone()));
        }
        parts
    }

    fn call_index(&self) -> usize {
        self.fragments
            .iter()
            .position(|f| matches!(f, Fragment::ToolCall(_)))
            .unwrap_or(self.fragments.len())
    }

    fn texts(&self, end: usize) -> String {
        self.fragments[..end]
            .iter()
            .filter_map(|f| match f {
                Fragment::Text(text) => Some(text.as_str()),
                Fragment::ToolCall(_) => None,
            })
            .collect()
    }
}
