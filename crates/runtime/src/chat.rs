//! The conversation loop: one user input in, one grounded reply out.

use crate::conversation::{Conversation, LoopState};
use crate::model::{Backend, ModelRequest, ModelResponse, Role, ToolCall, Turn, Usage};
use crate::tools::{Dispatcher, ToolRegistry, ToolResult};
use crate::turn::classify;
use crate::{Error, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

/// Something the user should see, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExchangeEvent {
    /// Assistant text.
    Text { text: String },
    /// The model asked for a tool.
    ToolInvocation {
        name: String,
        arguments: Map<String, Value>,
    },
    /// What the tool returned, verbatim.
    ToolResult { name: String, result: ToolResult },
}

/// The outcome of one completed exchange.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Exchange {
    pub events: Vec<ExchangeEvent>,
    /// Text shown to the user: text before the tool call plus the follow-up
    /// answer, or the whole reply when no tool was called.
    pub reply: String,
    /// States entered, in order, ending with [`LoopState::Idle`].
    pub states: Vec<LoopState>,
    /// Usage summed over every model call in the exchange.
    pub usage: Usage,
}

impl Exchange {
    /// The tool call made during this exchange, if any.
    pub fn tool_call(&self) -> Option<(&str, &Map<String, Value>)> {
        self.events.iter().find_map(|e| match e {
            ExchangeEvent::ToolInvocation { name, arguments } => Some((name.as_str(), arguments)),
            _ => None,
        })
    }
}

/// Drives exchanges between a user, a model backend and the tools.
///
/// The loop holds no conversation state itself; callers own each
/// [`Conversation`] and pass it in, so one loop can serve many of them.
pub struct ConversationLoop<B> {
    backend: B,
    dispatcher: Dispatcher,
}

impl<B: Backend> ConversationLoop<B> {
    pub fn new(backend: B, registry: ToolRegistry) -> Self {
        Self {
            backend,
            dispatcher: Dispatcher::new(registry),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run one exchange for `input`.
    ///
    /// At most one tool call is followed. The turns of the exchange are
    /// appended to the transcript only when it completes; on error the
    /// transcript is left as it was and the same input can be retried.
    pub async fn exchange(&self, conversation: &mut Conversation, input: &str) -> Result<Exchange> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::EmptyInput);
        }
        if conversation.state() != LoopState::Idle {
            // A previous exchange was dropped mid-flight; nothing of it was committed.
            warn!(conversation = %conversation.id, state = ?conversation.state(), "resetting abandoned exchange");
            conversation.set_state(LoopState::Idle);
        }

        let mut exchange = Exchange::default();
        let mut staged = vec![Turn::user(input)];

        let outcome = self
            .drive(conversation, &mut staged, &mut exchange)
            .await;
        enter(conversation, &mut exchange, LoopState::Idle);

        match outcome {
            Ok(()) => {
                conversation.commit(staged);
                info!(
                    conversation = %conversation.id,
                    turns = conversation.len(),
                    input_tokens = exchange.usage.input_tokens,
                    output_tokens = exchange.usage.output_tokens,
                    "exchange complete"
                );
                Ok(exchange)
            }
            Err(err) => {
                warn!(conversation = %conversation.id, error = %err, "exchange failed, transcript unchanged");
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        staged: &mut Vec<Turn>,
        exchange: &mut Exchange,
    ) -> Result<()> {
        enter(conversation, exchange, LoopState::AwaitingFirstResponse);
        let first = classify(&self.send(conversation, staged, exchange).await?);

        let Some(call) = first.tool_call().cloned() else {
            let text = first.text();
            push_text(exchange, &text);
            exchange.reply = text.clone();
            staged.push(Turn::assistant(text));
            enter(conversation, exchange, LoopState::Done);
            return Ok(());
        };

        if first.ignored_calls() > 0 {
            warn!(
                ignored = first.ignored_calls(),
                "response requested several tools, only the first is run"
            );
        }

        let leading = first.leading_text();
        push_text(exchange, &leading);

        enter(conversation, exchange, LoopState::ToolCallPending);
        let result = self.run_tool(&call, exchange).await;
        staged.push(Turn::new(Role::Assistant, first.to_parts()));
        staged.push(Turn::tool_result(call.name, result));

        enter(conversation, exchange, LoopState::AwaitingSecondResponse);
        let second = classify(&self.send(conversation, staged, exchange).await?);
        if let Some(next) = second.tool_call() {
            warn!(tool = %next.name, "follow-up response requested another tool, not followed");
        }

        let text = second.text();
        push_text(exchange, &text);
        exchange.reply = format!("{leading}{text}");
        staged.push(Turn::assistant(text));
        enter(conversation, exchange, LoopState::Done);
        Ok(())
    }

    async fn run_tool(&self, call: &ToolCall, exchange: &mut Exchange) -> ToolResult {
        info!(tool = %call.name, args = %serde_json::Value::Object(call.arguments.clone()), "calling tool");
        exchange.events.push(ExchangeEvent::ToolInvocation {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let result = self.dispatcher.dispatch(&call.name, &call.arguments).await;

        exchange.events.push(ExchangeEvent::ToolResult {
            name: call.name.clone(),
            result: result.clone(),
        });
        result
    }

    async fn send(
        &self,
        conversation: &Conversation,
        staged: &[Turn],
        exchange: &mut Exchange,
    ) -> Result<ModelResponse> {
        let turns: Vec<Turn> = conversation
            .turns()
            .iter()
            .chain(staged)
            .cloned()
            .collect();
        debug!(turns = turns.len(), tools = self.dispatcher.specs().len(), "calling model");

        let response = self
            .backend
            .call(ModelRequest {
                turns: &turns,
                tools: self.dispatcher.specs(),
            })
            .await?;
        exchange.usage += response.usage;
        Ok(response)
    }
}

fn enter(conversation: &mut Conversation, exchange: &mut Exchange, state: LoopState) {
    debug!(conversation = %conversation.id, from = ?conversation.state(), to = ?state, "transition");
    conversation.set_state(state);
    exchange.states.push(state);
}

fn push_text(exchange: &mut Exchange, text: &str) {
    if !text.is_empty() {
        exchange.events.push(ExchangeEvent::Text {
            text: text.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ModelError, ParamSpec, Part, ResponsePart, ToolSpec};
    use crate::tools::{Tool, ToolArguments};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replays canned responses and records every request it sees.
    #[derive(Default)]
    struct ScriptedBackend {
        responses: Mutex<VecDeque<std::result::Result<ModelResponse, ModelError>>>,
        requests: Mutex<Vec<(Vec<Turn>, Vec<String>)>>,
    }

    impl ScriptedBackend {
        fn new(
            responses: impl IntoIterator<Item = std::result::Result<ModelResponse, ModelError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                requests: Mutex::default(),
            }
        }

        fn requests(&self) -> Vec<(Vec<Turn>, Vec<String>)> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Backend for ScriptedBackend {
        async fn call(
            &self,
            request: ModelRequest<'_>,
        ) -> std::result::Result<ModelResponse, ModelError> {
            self.requests.lock().unwrap().push((
                request.turns.to_vec(),
                request.tools.iter().map(|t| t.name.clone()).collect(),
            ));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ModelError::Api("script exhausted".into())))
        }
    }

    /// Counts invocations and reports the city it was asked about.
    struct FakeWeather {
        spec: ToolSpec,
        calls: Arc<Mutex<Vec<ToolArguments>>>,
    }

    impl FakeWeather {
        fn new() -> (Self, Arc<Mutex<Vec<ToolArguments>>>) {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let tool = Self {
                spec: ToolSpec {
                    name: "get_weather".into(),
                    description: "Current weather".into(),
                    parameters: vec![ParamSpec::string("city", "City name")],
                },
                calls: Arc::clone(&calls),
            };
            (tool, calls)
        }
    }

    #[async_trait]
    impl Tool for FakeWeather {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }

        async fn invoke(&self, args: &ToolArguments) -> ToolResult {
            self.calls.lock().unwrap().push(args.clone());
            ToolResult::default()
                .with("city", args.text("city").unwrap_or_default())
                .with("temperature", 21.5)
        }
    }

    fn text(parts: &[&str]) -> std::result::Result<ModelResponse, ModelError> {
        Ok(ModelResponse {
            parts: parts.iter().map(|t| ResponsePart::text(*t)).collect(),
            usage: Usage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }

    fn call_part(name: &str, args: Value) -> ResponsePart {
        ResponsePart::call(ToolCall::new(name, args.as_object().cloned().unwrap_or_default()))
    }

    fn with_parts(parts: Vec<ResponsePart>) -> std::result::Result<ModelResponse, ModelError> {
        Ok(ModelResponse {
            parts,
            usage: Usage {
                input_tokens: 20,
                output_tokens: 3,
            },
        })
    }

    fn weather_loop(
        script: Vec<std::result::Result<ModelResponse, ModelError>>,
    ) -> (
        ConversationLoop<ScriptedBackend>,
        Arc<Mutex<Vec<ToolArguments>>>,
    ) {
        let (tool, calls) = FakeWeather::new();
        let chat = ConversationLoop::new(
            ScriptedBackend::new(script),
            ToolRegistry::new().with_tool(tool),
        );
        (chat, calls)
    }

    #[tokio::test]
    async fn text_reply_without_dispatch() {
        let (chat, calls) = weather_loop(vec![text(&["Hello", " world"])]);
        let mut conversation = Conversation::new();

        let exchange = chat.exchange(&mut conversation, "hi").await.unwrap();

        assert_eq!(exchange.reply, "Hello world");
        assert!(exchange.tool_call().is_none());
        assert!(calls.lock().unwrap().is_empty());
        assert_eq!(
            exchange.states,
            vec![
                LoopState::AwaitingFirstResponse,
                LoopState::Done,
                LoopState::Idle
            ]
        );
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.turns()[1].role, Role::Assistant);
        assert_eq!(conversation.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn tool_round_trip() {
        let (chat, calls) = weather_loop(vec![
            with_parts(vec![
                ResponsePart::text("Checking. "),
                call_part("get_weather", json!({"city": "London"})),
            ]),
            text(&["It is 21.5°C in London."]),
        ]);
        let mut conversation = Conversation::new();

        let exchange = chat
            .exchange(&mut conversation, "Weather in London?")
            .await
            .unwrap();

        let seen = calls.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].get("city"), &json!("London"));

        assert_eq!(
            exchange.states,
            vec![
                LoopState::AwaitingFirstResponse,
                LoopState::ToolCallPending,
                LoopState::AwaitingSecondResponse,
                LoopState::Done,
                LoopState::Idle,
            ]
        );
        assert_eq!(exchange.reply, "Checking. It is 21.5°C in London.");
        assert_eq!(
            exchange.usage,
            Usage {
                input_tokens: 30,
                output_tokens: 8
            }
        );

        let kinds: Vec<_> = exchange
            .events
            .iter()
            .map(|e| match e {
                ExchangeEvent::Text { .. } => "text",
                ExchangeEvent::ToolInvocation { .. } => "invocation",
                ExchangeEvent::ToolResult { .. } => "result",
            })
            .collect();
        assert_eq!(kinds, vec!["text", "invocation", "result", "text"]);

        let roles: Vec<_> = conversation.turns().iter().map(|t| t.role).collect();
        assert_eq!(
            roles,
            vec![Role::User, Role::Assistant, Role::Tool, Role::Assistant]
        );
        assert!(matches!(
            &conversation.turns()[2].parts[0],
            Part::ToolResult { name, result } if name == "get_weather" && result.get("city") == Some(&json!("London"))
        ));

        let requests = chat.backend().requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].0.len(), 1);
        assert_eq!(requests[0].1, vec!["get_weather"]);
        assert_eq!(requests[1].0.len(), 3);
        assert_eq!(requests[1].0[2].role, Role::Tool);
    }

    #[tokio::test]
    async fn model_failure_leaves_transcript_unchanged() {
        let (chat, _) = weather_loop(vec![
            text(&["first"]),
            Err(ModelError::Network("connection refused".into())),
            text(&["second"]),
        ]);
        let mut conversation = Conversation::new();
        chat.exchange(&mut conversation, "one").await.unwrap();
        let before = conversation.len();

        let err = chat.exchange(&mut conversation, "two").await.unwrap_err();
        assert!(matches!(err, Error::Model(ModelError::Network(_))));
        assert_eq!(conversation.len(), before);
        assert_eq!(conversation.state(), LoopState::Idle);

        let retry = chat.exchange(&mut conversation, "two").await.unwrap();
        assert_eq!(retry.reply, "second");
        assert_eq!(conversation.len(), before + 2);
    }

    #[tokio::test]
    async fn failure_after_tool_call_commits_nothing() {
        let (chat, calls) = weather_loop(vec![
            with_parts(vec![call_part("get_weather", json!({"city": "Oslo"}))]),
            Err(ModelError::InvalidResponse("truncated".into())),
        ]);
        let mut conversation = Conversation::new();

        assert!(chat.exchange(&mut conversation, "Oslo?").await.is_err());
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert!(conversation.is_empty());
        assert_eq!(conversation.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn second_tool_call_is_not_followed() {
        let (chat, calls) = weather_loop(vec![
            with_parts(vec![call_part("get_weather", json!({"city": "Paris"}))]),
            with_parts(vec![
                ResponsePart::text("Paris is mild."),
                call_part("get_weather", json!({"city": "Lyon"})),
            ]),
        ]);
        let mut conversation = Conversation::new();

        let exchange = chat.exchange(&mut conversation, "Paris?").await.unwrap();

        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(exchange.reply, "Paris is mild.");
        assert_eq!(chat.backend().requests().len(), 2);
        assert_eq!(conversation.turns().last().unwrap().text(), "Paris is mild.");
        assert!(conversation.turns().last().unwrap().tool_call().is_none());
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_model() {
        let (chat, calls) = weather_loop(vec![
            with_parts(vec![call_part("get_time", json!({}))]),
            text(&["I can't tell the time."]),
        ]);
        let mut conversation = Conversation::new();

        let exchange = chat.exchange(&mut conversation, "time?").await.unwrap();

        assert!(calls.lock().unwrap().is_empty());
        let result = exchange
            .events
            .iter()
            .find_map(|e| match e {
                ExchangeEvent::ToolResult { result, .. } => Some(result.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            result.error_message(),
            Some("Unknown tool: get_time. Available tools: get_weather")
        );
        assert_eq!(exchange.reply, "I can't tell the time.");
    }

    #[tokio::test]
    async fn empty_input_is_rejected_before_model_call() {
        let (chat, _) = weather_loop(vec![]);
        let mut conversation = Conversation::new();

        let err = chat.exchange(&mut conversation, "   ").await.unwrap_err();
        assert!(matches!(err, Error::EmptyInput));
        assert!(chat.backend().requests().is_empty());
        assert!(conversation.is_empty());
    }

    #[tokio::test]
    async fn history_is_sent_on_later_exchanges() {
        let (chat, _) = weather_loop(vec![text(&["a"]), text(&["b"])]);
        let mut conversation = Conversation::new();
        chat.exchange(&mut conversation, "one").await.unwrap();
        chat.exchange(&mut conversation, "two").await.unwrap();

        let requests = chat.backend().requests();
        let second: Vec<_> = requests[1].0.iter().map(Turn::text).collect();
        assert_eq!(second, vec!["one", "a", "two"]);
    }
}
