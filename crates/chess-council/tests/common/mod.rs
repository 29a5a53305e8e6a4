//! Shared fakes for integration tests: a scripted chat backend and a
//! table-driven oracle. No network, no engine binary.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use arbiter::{Evaluation, MoveCandidate, OracleError, Position, PositionOracle};
use async_trait::async_trait;
use chess_council::llm::{ChatBackend, ChatReply, ChatRequest, LlmError, ToolInvocation};

pub const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

pub fn text(s: &str) -> Result<ChatReply, LlmError> {
    Ok(ChatReply::Text(s.to_string()))
}

pub fn tool(id: &str, name: &str, arguments: &str) -> Result<ChatReply, LlmError> {
    Ok(ChatReply::ToolCall(ToolInvocation {
        id: id.to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }))
}

pub fn transport_error() -> Result<ChatReply, LlmError> {
    Err(LlmError::Transport("connection reset".into()))
}

/// Replies are queued per model name and handed out in order.
#[derive(Default)]
pub struct ScriptedBackend {
    queues: Mutex<HashMap<String, VecDeque<Result<ChatReply, LlmError>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(
        self,
        model: &str,
        replies: impl IntoIterator<Item = Result<ChatReply, LlmError>>,
    ) -> Self {
        self.queues
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .extend(replies);
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.queues.lock().unwrap().values().map(VecDeque::len).sum()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    async fn complete(&self, request: ChatRequest) -> Result<ChatReply, LlmError> {
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        self.queues
            .lock()
            .unwrap()
            .get_mut(&model)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Err(LlmError::Transport(format!("script exhausted for {model}"))))
    }
}

/// Evaluations keyed by move; unknown moves are illegal.
#[derive(Default)]
pub struct FakeOracle {
    evals: HashMap<String, Evaluation>,
    unavailable: bool,
    best: Option<String>,
    pub validations: AtomicUsize,
    pub evaluations: AtomicUsize,
}

impl FakeOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eval(mut self, mv: &str, eval: Evaluation) -> Self {
        self.evals.insert(mv.to_string(), eval);
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub fn best(mut self, mv: &str) -> Self {
        self.best = Some(mv.to_string());
        self
    }

    pub fn evaluation_calls(&self) -> usize {
        self.evaluations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PositionOracle for FakeOracle {
    async fn validate(&self, _position: &Position) -> Result<(), OracleError> {
        self.validations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn evaluate_after(
        &self,
        position: &Position,
        mv: &MoveCandidate,
    ) -> Result<Evaluation, OracleError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(OracleError::Unavailable("engine crashed".into()));
        }
        self.evals
            .get(mv.as_str())
            .copied()
            .ok_or_else(|| OracleError::IllegalMove {
                mv: mv.to_string(),
                fen: position.fen().to_string(),
            })
    }

    async fn best_move(&self, _position: &Position) -> Result<Option<String>, OracleError> {
        Ok(self.best.clone())
    }
}
