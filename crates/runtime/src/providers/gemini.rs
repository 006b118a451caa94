//! Google Gemini API backend.

use crate::model::{
    Backend, ModelError, ModelRequest, ModelResponse, Part, ResponsePart, Role, ToolCall,
    ToolSpec, Turn, Usage,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTools>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<ApiSystemInstruction>,
    generation_config: ApiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct ApiContent {
    role: &'static str,
    parts: Vec<ApiPart>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    /// Echoed back beside the `functionCall` it arrived with.
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl ApiPart {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiFunctionCall {
    name: String,
    args: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTools {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize)]
struct ApiSystemInstruction {
    parts: Vec<ApiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    prompt_feedback: Option<ApiPromptFeedback>,
    usage_metadata: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    content: Option<ApiResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseContent {
    #[serde(default)]
    parts: Vec<ApiResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponsePart {
    text: Option<String>,
    function_call: Option<ApiResponseCall>,
    thought_signature: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseCall {
    name: String,
    #[serde(default)]
    args: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    system: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            max_output_tokens: 4096,
            system: None,
            timeout: None,
        }
    }

    /// Point at a different API root (proxies, test fixtures).
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Per-request timeout. Unbounded when unset.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            max_output_tokens: self.max_output_tokens,
            system: self.system,
            timeout: self.timeout,
        }
    }
}

/// Gemini `generateContent` backend with function calling.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: u32,
    system: Option<String>,
    timeout: Option<Duration>,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key, model)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn role_to_api(role: Role) -> &'static str {
        match role {
            Role::User | Role::Tool => "user",
            Role::Assistant => "model",
        }
    }

    /// Convert a turn; `None` when nothing in it is sendable.
    fn turn_to_api(turn: &Turn) -> Option<ApiContent> {
        let parts: Vec<ApiPart> = turn
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } if text.is_empty() => None,
                Part::Text { text } => Some(ApiPart::text(text.clone())),
                Part::ToolCall(call) => Some(ApiPart {
                    function_call: Some(ApiFunctionCall {
                        name: call.name.clone(),
                        args: call.arguments.clone(),
                    }),
                    thought_signature: call.signature.clone(),
                    ..Default::default()
                }),
                Part::ToolResult { name, result } => Some(ApiPart {
                    function_response: Some(ApiFunctionResponse {
                        name: name.clone(),
                        response: result.clone().into_value(),
                    }),
                    ..Default::default()
                }),
            })
            .collect();

        (!parts.is_empty()).then(|| ApiContent {
            role: Self::role_to_api(turn.role),
            parts,
        })
    }

    fn tools_to_api(specs: &[ToolSpec]) -> Vec<ApiTools> {
        if specs.is_empty() {
            return Vec::new();
        }
        vec![ApiTools {
            function_declarations: specs
                .iter()
                .map(|spec| ApiFunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters: spec.schema(),
                })
                .collect(),
        }]
    }

    fn response_to_model(response: ApiResponse) -> Result<ModelResponse, ModelError> {
        if response.candidates.is_empty() {
            if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(ModelError::Blocked(reason));
            }
        }

        let parts = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .map(|part| ResponsePart {
                text: part.text,
                function_call: part.function_call.map(|call| ToolCall {
                    name: call.name,
                    arguments: call.args.unwrap_or_default(),
                    signature: part.thought_signature,
                }),
            })
            .collect();

        let usage = response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ModelResponse { parts, usage })
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let api_request = ApiRequest {
            contents: request.turns.iter().filter_map(Self::turn_to_api).collect(),
            tools: Self::tools_to_api(request.tools),
            system_instruction: self.system.as_ref().map(|s| ApiSystemInstruction {
                parts: vec![ApiPart::text(s.clone())],
            }),
            generation_config: ApiGenerationConfig {
                max_output_tokens: self.max_output_tokens,
            },
        };

        info!(
            model = self.model.as_str(),
            contents = api_request.contents.len(),
            tools = request.tools.len(),
            "sending request to Gemini"
        );

        let mut req = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json");
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(ModelError::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = serde_json::from_str(&body)
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;
        debug!(candidates = api_response.candidates.len(), "received response from Gemini");

        Self::response_to_model(api_response)
    }
}
