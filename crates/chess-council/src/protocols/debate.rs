//! Adversarial debate: two personas, four rounds, then text extraction.
//!
//! ```text
//! round 1..=4:
//!   Alpha ◄── fen + instruction (+ Beta's previous statement from round 2)
//!   Beta  ◄── fen + instruction (+ Alpha's statement from this round)
//! extraction:
//!   Beta's round-4 statement ──► Alpha's round-4 statement ──► no move
//! ```
//!
//! Each persona keeps its own private history. A failed model call becomes
//! that turn's statement (marked `failed`) and the debate carries on; failed
//! turns are never used for extraction.

use std::fmt;
use std::sync::{Arc, LazyLock};

use arbiter::{MoveCandidate, Position};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{MoveProtocol, ProtocolError};
use crate::llm::{ChatBackend, ChatMessage, ChatReply, ChatRequest};
use crate::prompts;

/// Coordinate move: square, square, optional promotion piece.
static STRICT_MOVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-h][1-8][a-h][1-8][qrbn]?)\b").expect("STRICT_MOVE regex should compile")
});

/// Any 4-5 character alphanumeric word; shape-checked afterwards.
static LOOSE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([a-zA-Z0-9]{4,5})\b").expect("LOOSE_TOKEN regex should compile")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Persona {
    Alpha,
    Beta,
}

impl Persona {
    fn system_prompt(self) -> &'static str {
        match self {
            Self::Alpha => prompts::DEBATER_ALPHA,
            Self::Beta => prompts::DEBATER_BETA,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Alpha => write!(f, "Alpha"),
            Self::Beta => write!(f, "Beta"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub round: u8,
    pub speaker: Persona,
    pub text: String,
    /// The model call failed and `text` is the error description.
    pub failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebateOutcome {
    pub mv: Option<MoveCandidate>,
    pub transcript: Vec<TranscriptEntry>,
}

/// Last move-shaped token in `text`, strict pattern first.
pub fn extract_move(text: &str) -> Option<String> {
    if let Some(m) = STRICT_MOVE.captures_iter(text).last() {
        return Some(m[1].to_string());
    }
    LOOSE_TOKEN
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .filter(|token| has_move_shape(token))
        .last()
}

/// letter, digit, letter, digit, optional letter.
fn has_move_shape(token: &str) -> bool {
    let b = token.as_bytes();
    let core = b.len() >= 4
        && b[0].is_ascii_alphabetic()
        && b[1].is_ascii_digit()
        && b[2].is_ascii_alphabetic()
        && b[3].is_ascii_digit();
    match b.len() {
        4 => core,
        5 => core && b[4].is_ascii_alphabetic(),
        _ => false,
    }
}

/// One persona's side of the debate.
struct Debater {
    persona: Persona,
    history: Vec<ChatMessage>,
}

impl Debater {
    fn new(persona: Persona) -> Self {
        Self {
            persona,
            history: vec![ChatMessage::system(persona.system_prompt())],
        }
    }

    async fn speak(
        &mut self,
        backend: &dyn ChatBackend,
        model: &str,
        prompt: String,
    ) -> (String, bool) {
        self.history.push(ChatMessage::user(prompt));
        let request = ChatRequest::new(model, self.history.clone());
        let (text, failed) = match backend.complete(request).await {
            Ok(ChatReply::Text(text)) => (text, false),
            Ok(ChatReply::ToolCall(call)) => (
                format!("Error: {} replied with an unexpected tool call '{}'", self.persona, call.name),
                true,
            ),
            Err(e) => (format!("Error: {} could not respond: {e}", self.persona), true),
        };
        self.history.push(ChatMessage::assistant(text.clone()));
        (text, failed)
    }
}

pub struct DebateProtocol {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl DebateProtocol {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    /// Run all rounds and extract the final move. Never fails: model errors
    /// are recorded in the transcript.
    pub async fn run(&self, position: &Position) -> DebateOutcome {
        let fen = position.fen();
        let mut alpha = Debater::new(Persona::Alpha);
        let mut beta = Debater::new(Persona::Beta);
        let mut transcript = Vec::with_capacity(2 * usize::from(prompts::DEBATE_ROUNDS));
        let mut last_beta = String::new();

        for round in 1..=prompts::DEBATE_ROUNDS {
            let prompt = if round == 1 {
                prompts::debate_opening(fen, round)
            } else {
                prompts::debate_reply(fen, round, &Persona::Beta.to_string(), &last_beta)
            };
            let (alpha_text, alpha_failed) =
                alpha.speak(self.backend.as_ref(), &self.model, prompt).await;
            if alpha_failed {
                warn!(round, speaker = %Persona::Alpha, "debate turn failed");
            }
            debug!(round, speaker = %Persona::Alpha, text = %alpha_text, "debate turn");

            let prompt = if round == 1 {
                prompts::debate_opening(fen, round)
            } else {
                prompts::debate_reply(fen, round, &Persona::Alpha.to_string(), &alpha_text)
            };
            let (beta_text, beta_failed) =
                beta.speak(self.backend.as_ref(), &self.model, prompt).await;
            if beta_failed {
                warn!(round, speaker = %Persona::Beta, "debate turn failed");
            }
            debug!(round, speaker = %Persona::Beta, text = %beta_text, "debate turn");

            transcript.push(TranscriptEntry {
                round,
                speaker: Persona::Alpha,
                text: alpha_text,
                failed: alpha_failed,
            });
            transcript.push(TranscriptEntry {
                round,
                speaker: Persona::Beta,
                text: beta_text.clone(),
                failed: beta_failed,
            });
            last_beta = beta_text;
        }

        let mv = final_move(&transcript);
        match &mv {
            Some(mv) => info!(protocol = "debate", mv = %mv, "proposed"),
            None => warn!(protocol = "debate", "no move could be extracted"),
        }
        DebateOutcome { mv, transcript }
    }
}

/// Beta's final statement first, then Alpha's; failed turns are skipped.
fn final_move(transcript: &[TranscriptEntry]) -> Option<MoveCandidate> {
    let closing = |speaker: Persona| {
        transcript
            .iter()
            .rev()
            .find(|e| e.speaker == speaker && e.round == prompts::DEBATE_ROUNDS && !e.failed)
    };
    [Persona::Beta, Persona::Alpha]
        .into_iter()
        .filter_map(closing)
        .find_map(|entry| extract_move(&entry.text))
        .and_then(|token| MoveCandidate::parse(&token).ok())
}

#[async_trait]
impl MoveProtocol for DebateProtocol {
    fn name(&self) -> &str {
        "debate"
    }

    async fn decide(&self, position: &Position) -> Result<MoveCandidate, ProtocolError> {
        self.run(position).await.mv.ok_or(ProtocolError::NoMove)
    }
}
