//! Manager/verifier loop.
//!
//! ```text
//! risk advisory ─┐
//!                ├─► briefing ─► manager ──┬─ check_legality(mv) ─► verifier ─► tool result ─┐
//! strategy adv. ─┘                 ▲       ├─ submit_final(mv)   ─► return mv                 │
//!                                  │       ├─ text               ─► reminder ─────────────────┤
//!                                  │       └─ transport error    ─► user note ────────────────┤
//!                                  └───────────────── next iteration (≤ MAX_ITERATIONS) ◄─────┘
//! ```
//!
//! Every branch except `submit_final` consumes one iteration. A submitted
//! move is returned even if it was never verified; the arena's oracle is
//! the authority on legality.

use std::sync::Arc;

use arbiter::{MoveCandidate, Position};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::verifier::{Verdict, Verifier};
use super::{string_arg, tool_spec, MoveProtocol, ProtocolError};
use crate::llm::{
    ChatBackend, ChatMessage, ChatReply, ChatRequest, ToolChoice, ToolInvocation, ToolSpec,
};
use crate::prompts;

/// Manager turns allowed per position.
pub const MAX_ITERATIONS: u32 = 5;

/// Arguments of `check_legality`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CheckLegalityArgs {
    /// The move to check, in UCI notation (e.g. e2e4, e7e8q).
    #[serde(rename = "move")]
    pub mv: String,
}

/// Arguments of `submit_final`.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SubmitFinalArgs {
    /// The final move, in UCI notation.
    #[serde(rename = "move")]
    pub mv: String,
    /// Brief reason for choosing this move.
    pub justification: String,
}

fn manager_tools() -> Vec<ToolSpec> {
    vec![
        tool_spec::<CheckLegalityArgs>(
            prompts::CHECK_LEGALITY_TOOL,
            "Ask the verifier whether a UCI move is legal in the current position. \
             Returns JSON with is_legal, checked_move and reason.",
        ),
        tool_spec::<SubmitFinalArgs>(
            prompts::SUBMIT_FINAL_TOOL,
            "Submit the final move, already confirmed legal, with a brief justification.",
        ),
    ]
}

/// Working state for one position. Dropped when the loop exits.
struct ManagerSession {
    history: Vec<ChatMessage>,
    iteration: u32,
    last_verdict: Option<Verdict>,
}

/// What a tool call led to.
enum Step {
    Final(MoveCandidate),
    Continue(String),
}

fn tool_error(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

pub struct ManagerProtocol {
    backend: Arc<dyn ChatBackend>,
    manager_model: String,
    analyst_model: String,
    verifier: Verifier,
}

impl ManagerProtocol {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        manager_model: impl Into<String>,
        analyst_model: impl Into<String>,
    ) -> Self {
        let analyst_model = analyst_model.into();
        Self {
            verifier: Verifier::new(Arc::clone(&backend), analyst_model.clone()),
            backend,
            manager_model: manager_model.into(),
            analyst_model,
        }
    }

    async fn advisory(
        &self,
        role: &'static str,
        system: &str,
        request: String,
    ) -> Result<String, ProtocolError> {
        let request = ChatRequest::new(
            &self.analyst_model,
            vec![ChatMessage::system(system), ChatMessage::user(request)],
        );
        match self.backend.complete(request).await {
            Ok(ChatReply::Text(text)) => {
                debug!(role, text = %text, "advisory report");
                Ok(text)
            }
            Ok(ChatReply::ToolCall(call)) => Err(ProtocolError::Malformed(format!(
                "{role} advisory answered with tool call '{}'",
                call.name
            ))),
            Err(source) => Err(ProtocolError::Advisory { role, source }),
        }
    }

    async fn dispatch(
        &self,
        position: &Position,
        call: &ToolInvocation,
        session: &mut ManagerSession,
    ) -> Step {
        match call.name.as_str() {
            prompts::CHECK_LEGALITY_TOOL => match string_arg(&call.arguments, "move") {
                Ok(mv) => {
                    let verdict = self.verifier.judge(position.fen(), &mv).await;
                    let result = verdict.to_json();
                    session.last_verdict = Some(verdict);
                    Step::Continue(result)
                }
                Err(message) => Step::Continue(tool_error(message)),
            },
            prompts::SUBMIT_FINAL_TOOL => {
                let raw = match string_arg(&call.arguments, "move") {
                    Ok(raw) => raw,
                    Err(message) => return Step::Continue(tool_error(message)),
                };
                match MoveCandidate::parse(&raw) {
                    Ok(mv) => {
                        let justification = string_arg(&call.arguments, "justification")
                            .unwrap_or_else(|_| "no justification provided".into());
                        let verified = session
                            .last_verdict
                            .as_ref()
                            .is_some_and(|v| v.is_legal && v.checked_move == mv.as_str());
                        info!(
                            protocol = "manager",
                            mv = %mv,
                            iteration = session.iteration,
                            verified,
                            justification = %justification,
                            "proposed"
                        );
                        Step::Final(mv)
                    }
                    Err(e) => Step::Continue(tool_error(format!(
                        "final move rejected: {e}. Submit a UCI move such as e2e4."
                    ))),
                }
            }
            other => {
                warn!(tool = other, "manager called an unknown tool");
                Step::Continue(tool_error(format!("unknown tool '{other}'")))
            }
        }
    }
}

#[async_trait]
impl MoveProtocol for ManagerProtocol {
    fn name(&self) -> &str {
        "manager"
    }

    async fn decide(&self, position: &Position) -> Result<MoveCandidate, ProtocolError> {
        let fen = position.fen();
        let risk = self
            .advisory("risk", prompts::RISK_ANALYST, prompts::risk_request(fen))
            .await?;
        let strategy = self
            .advisory("strategy", prompts::STRATEGY_ANALYST, prompts::strategy_request(fen))
            .await?;

        let mut session = ManagerSession {
            history: vec![
                ChatMessage::system(prompts::manager_system()),
                ChatMessage::user(prompts::manager_briefing(fen, &risk, &strategy)),
            ],
            iteration: 0,
            last_verdict: None,
        };
        let tools = manager_tools();

        while session.iteration < MAX_ITERATIONS {
            session.iteration += 1;
            debug!(iteration = session.iteration, "manager turn");

            let request = ChatRequest::new(&self.manager_model, session.history.clone())
                .with_tools(tools.clone(), ToolChoice::Auto);
            let reply = match self.backend.complete(request).await {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(iteration = session.iteration, error = %e, "manager call failed");
                    session
                        .history
                        .push(ChatMessage::user(prompts::manager_transport_note(&e.to_string())));
                    continue;
                }
            };

            match reply {
                ChatReply::Text(text) => {
                    session.history.push(ChatMessage::assistant(text));
                    session.history.push(ChatMessage::user(prompts::manager_nudge()));
                }
                ChatReply::ToolCall(call) => {
                    session
                        .history
                        .push(ChatMessage::AssistantToolCall { call: call.clone() });
                    match self.dispatch(position, &call, &mut session).await {
                        Step::Final(mv) => return Ok(mv),
                        Step::Continue(result) => {
                            session.history.push(ChatMessage::tool_result(&call, result))
                        }
                    }
                }
            }
        }

        warn!(protocol = "manager", "iteration ceiling reached without a final move");
        Err(ProtocolError::Exhausted(MAX_ITERATIONS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_offers_exactly_two_tools() {
        let tools = manager_tools();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["check_legality", "submit_final"]);
        assert_eq!(tools[1].parameters["required"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn tool_errors_are_json_objects() {
        let v: serde_json::Value = serde_json::from_str(&tool_error("bad")).unwrap();
        assert_eq!(v["error"], "bad");
    }
}
