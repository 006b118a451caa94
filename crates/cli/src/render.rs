//! Terminal rendering for exchanges and tool listings.

use runtime::{ExchangeEvent, ToolSpec, Usage};
use serde_json::Value;

pub const BANNER: &str = "\
Welcome to toolchat!
I can check the current weather for any city and look up the latest stock prices.
Try: \"What's the weather in Tokyo?\" or \"How is AAPL trading?\"
Type 'exit', 'quit' or 'bye' to leave.";

pub const GOODBYE: &str = "Chatbot: Goodbye! Have a great day!";

pub const EMPTY_INPUT: &str = "Chatbot: Please enter a message.";

/// Whether `input` ends the session.
pub fn is_exit(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "exit" | "quit" | "bye"
    )
}

/// One line per event. Tool activity is bracketed so it stands apart from
/// assistant text.
pub fn event(event: &ExchangeEvent) -> String {
    match event {
        ExchangeEvent::Text { text } => format!("Chatbot: {text}"),
        ExchangeEvent::ToolInvocation { name, arguments } => format!(
            "[Calling tool: {name} with args: {}]",
            Value::Object(arguments.clone())
        ),
        ExchangeEvent::ToolResult { result, .. } => format!("[Tool result: {result}]"),
    }
}

pub fn usage(usage: &Usage) -> String {
    format!(
        "[tokens: {} in, {} out]",
        usage.input_tokens, usage.output_tokens
    )
}

pub fn tools(specs: &[ToolSpec]) -> String {
    let mut out = String::new();
    for spec in specs {
        out.push_str(&format!("{}\n    {}\n", spec.name, spec.description));
        for param in &spec.parameters {
            let required = if param.required { "required" } else { "optional" };
            out.push_str(&format!(
                "    - {} ({}, {required}): {}\n",
                param.name,
                param.kind.as_str(),
                param.description
            ));
        }
    }
    out
}
