//! Structured proposal: one forced tool call, one move.

use std::sync::Arc;

use arbiter::{MoveCandidate, Position};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info};

use super::{string_arg, tool_spec, MoveProtocol, ProtocolError};
use crate::llm::{ChatBackend, ChatMessage, ChatReply, ChatRequest, ToolChoice};
use crate::prompts;

/// Arguments of the `propose_move` tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ProposeMoveArgs {
    /// The chess move in UCI notation (e.g. e2e4, e7e8q).
    #[serde(rename = "move")]
    pub mv: String,
}

pub struct StructuredProtocol {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl StructuredProtocol {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

#[async_trait]
impl MoveProtocol for StructuredProtocol {
    fn name(&self) -> &str {
        "structured"
    }

    async fn decide(&self, position: &Position) -> Result<MoveCandidate, ProtocolError> {
        let fen = position.fen();
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(prompts::proposer_system(fen)),
                ChatMessage::user(prompts::proposer_user(fen)),
            ],
        )
        .with_tools(
            vec![tool_spec::<ProposeMoveArgs>(
                prompts::PROPOSE_TOOL,
                "Provide the best chess move in UCI notation.",
            )],
            ToolChoice::Force(prompts::PROPOSE_TOOL.to_string()),
        );

        let call = match self.backend.complete(request).await? {
            ChatReply::ToolCall(call) => call,
            ChatReply::Text(text) => {
                return Err(ProtocolError::Malformed(format!(
                    "expected a '{}' call, got text: {}",
                    prompts::PROPOSE_TOOL,
                    if text.is_empty() { "<empty>" } else { text.as_str() }
                )))
            }
        };

        if call.name != prompts::PROPOSE_TOOL {
            return Err(ProtocolError::Malformed(format!(
                "unexpected tool '{}'",
                call.name
            )));
        }

        let raw = string_arg(&call.arguments, "move").map_err(ProtocolError::Malformed)?;
        debug!(raw = %raw, "structured proposal");
        let mv = MoveCandidate::parse(&raw)?;
        info!(protocol = "structured", mv = %mv, "proposed");
        Ok(mv)
    }
}
