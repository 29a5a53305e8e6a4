//! Legality verifier sub-call used by the manager.
//!
//! The verifier is another model, asked for a JSON judgment. Whatever goes
//! wrong (transport, non-JSON, wrong types) is coerced into a negative
//! verdict with a reason, never into an error.

use std::sync::Arc;

use arbiter::moves::canonicalize_promotion;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::{ChatBackend, ChatMessage, ChatReply, ChatRequest};
use crate::prompts;

/// A legality judgment, exactly as fed back to the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub is_legal: bool,
    pub checked_move: String,
    pub reason: String,
}

impl Verdict {
    pub fn rejected(checked_move: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            is_legal: false,
            checked_move: checked_move.into(),
            reason: reason.into(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(
                r#"{{"is_legal":{},"checked_move":"","reason":"unserializable verdict"}}"#,
                self.is_legal
            )
        })
    }
}

pub struct Verifier {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl Verifier {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub async fn judge(&self, fen: &str, mv: &str) -> Verdict {
        let request = ChatRequest::new(
            &self.model,
            vec![
                ChatMessage::system(prompts::VERIFIER_SYSTEM),
                ChatMessage::user(prompts::verifier_request(fen, mv)),
            ],
        )
        .json_object();

        let verdict = match self.backend.complete(request).await {
            Ok(ChatReply::Text(raw)) => parse_verdict(&raw, mv),
            Ok(ChatReply::ToolCall(call)) => Verdict::rejected(
                mv,
                format!("verifier called tool '{}' instead of answering", call.name),
            ),
            Err(e) => Verdict::rejected(mv, format!("verifier call failed: {e}")),
        };
        debug!(mv, is_legal = verdict.is_legal, reason = %verdict.reason, "verifier judgment");
        verdict
    }
}

/// Parse and sanitize a verifier reply for `mv`.
pub fn parse_verdict(raw: &str, mv: &str) -> Verdict {
    let value: Value = match serde_json::from_str(raw.trim()) {
        Ok(v @ Value::Object(_)) => v,
        Ok(_) | Err(_) => {
            warn!(raw, "verifier reply was not a JSON object");
            return Verdict::rejected(mv, "verifier response was not valid JSON");
        }
    };

    let mut reason = value
        .get("reason")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let is_legal = match value.get("is_legal") {
        Some(Value::Bool(b)) => *b,
        _ => {
            warn!(raw, "verifier 'is_legal' was not a boolean; treating as illegal");
            if !reason.is_empty() {
                reason.push(' ');
            }
            reason.push_str("(coerced: is_legal was not a boolean)");
            false
        }
    };

    let checked_move = value
        .get("checked_move")
        .and_then(Value::as_str)
        .map(|s| canonicalize_promotion(s.trim()))
        .unwrap_or_else(|| mv.to_string());

    Verdict {
        is_legal,
        checked_move,
        reason,
    }
}
