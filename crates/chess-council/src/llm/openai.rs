//! OpenAI-compatible `/chat/completions` client.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{
    ChatBackend, ChatMessage, ChatReply, ChatRequest, LlmError, ResponseFormat, ToolChoice,
    ToolInvocation,
};

pub struct OpenAiChatClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, LlmError> {
        let body = request_body(&request);
        debug!(model = %request.model, messages = request.messages.len(), "chat completion");

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout(self.timeout)
                } else {
                    LlmError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Decode(e.to_string()))?;
        parse_reply(parsed)
    }
}

// ── Wire format ────────────────────────────────────────────────────

fn message_json(message: &ChatMessage) -> Value {
    match message {
        ChatMessage::System { content } => json!({"role": "system", "content": content}),
        ChatMessage::User { content } => json!({"role": "user", "content": content}),
        ChatMessage::Assistant { content } => json!({"role": "assistant", "content": content}),
        ChatMessage::AssistantToolCall { call } => json!({
            "role": "assistant",
            "content": Value::Null,
            "tool_calls": [{
                "id": call.id,
                "type": "function",
                "function": {"name": call.name, "arguments": call.arguments}
            }]
        }),
        ChatMessage::ToolResult {
            call_id,
            name,
            content,
        } => json!({
            "role": "tool",
            "tool_call_id": call_id,
            "name": name,
            "content": content
        }),
    }
}

/// Build the JSON request body for `request`.
pub fn request_body(request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": request.messages.iter().map(message_json).collect::<Vec<_>>(),
    });

    if !request.tools.is_empty() {
        body["tools"] = request
            .tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters
                    }
                })
            })
            .collect();
        body["tool_choice"] = match &request.tool_choice {
            ToolChoice::Auto => json!("auto"),
            ToolChoice::None => json!("none"),
            ToolChoice::Force(name) => json!({"type": "function", "function": {"name": name}}),
        };
    }

    if request.response_format == ResponseFormat::JsonObject {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunction,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

/// Only the first tool call of a reply is surfaced.
fn parse_reply(response: CompletionResponse) -> Result<ChatReply, LlmError> {
    let message = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyResponse)?
        .message;

    match message.tool_calls.and_then(|calls| calls.into_iter().next()) {
        Some(call) => Ok(ChatReply::ToolCall(ToolInvocation {
            id: call.id,
            name: call.function.name,
            arguments: call.function.arguments,
        })),
        None => Ok(ChatReply::Text(message.content.unwrap_or_default())),
    }
}
