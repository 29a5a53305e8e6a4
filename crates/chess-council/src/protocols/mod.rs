//! Move-proposal protocols.
//!
//! Each protocol turns a position into one [`MoveCandidate`] (or a typed
//! failure) by talking to a language model. None of them consult the
//! oracle; legality is only established when the arena scores the move.
//!
//! | Protocol     | Model calls per position      | Output source              |
//! |--------------|-------------------------------|----------------------------|
//! | `structured` | 1 (forced tool call)          | `propose_move.move`        |
//! | `debate`     | 8 (2 personas × 4 rounds)     | regex over round-4 text    |
//! | `manager`    | 2 advisories + ≤5 manager + verifier checks | `submit_final.move` |
//!
//! ## Failure classification
//!
//! | Kind        | Counted as | Examples                                   |
//! |-------------|------------|--------------------------------------------|
//! | Transport   | errored    | HTTP failure, advisory call failure        |
//! | Malformed   | malformed  | wrong tool, bad JSON, bad move shape, no move |
//! | Exhausted   | errored    | manager hit its iteration ceiling          |
//! | Timeout     | errored    | protocol exceeded its wall-clock limit     |

pub mod debate;
pub mod manager;
pub mod structured;
pub mod verifier;

use std::fmt;
use std::time::Duration;

use arbiter::{MoveCandidate, MoveShapeError, Position};
use async_trait::async_trait;
use schemars::JsonSchema;
use thiserror::Error;

use crate::llm::{LlmError, ToolSpec};

pub use debate::{extract_move, DebateOutcome, DebateProtocol, Persona, TranscriptEntry};
pub use manager::{ManagerProtocol, MAX_ITERATIONS};
pub use structured::StructuredProtocol;
pub use verifier::{Verdict, Verifier};

/// Coarse classification of a protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Transport,
    Malformed,
    Exhausted,
    Timeout,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::Malformed => write!(f, "malformed"),
            Self::Exhausted => write!(f, "exhausted"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),

    #[error("{role} advisory failed: {source}")]
    Advisory {
        role: &'static str,
        #[source]
        source: LlmError,
    },

    #[error("malformed reply: {0}")]
    Malformed(String),

    #[error("invalid move: {0}")]
    Shape(#[from] MoveShapeError),

    #[error("no move could be extracted")]
    NoMove,

    #[error("max iterations ({0}) exceeded")]
    Exhausted(u32),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl ProtocolError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Llm(LlmError::Timeout(_)) | Self::Timeout(_) => FailureKind::Timeout,
            Self::Llm(_) | Self::Advisory { .. } => FailureKind::Transport,
            Self::Malformed(_) | Self::Shape(_) | Self::NoMove => FailureKind::Malformed,
            Self::Exhausted(_) => FailureKind::Exhausted,
        }
    }

    pub fn is_malformed(&self) -> bool {
        self.kind() == FailureKind::Malformed
    }
}

#[async_trait]
pub trait MoveProtocol: Send + Sync {
    /// Stable name used in logs, tallies and the summary.
    fn name(&self) -> &str;

    async fn decide(&self, position: &Position) -> Result<MoveCandidate, ProtocolError>;
}

/// Build a tool spec whose parameters schema is derived from `T`.
pub(crate) fn tool_spec<T: JsonSchema>(name: &str, description: &str) -> ToolSpec {
    let mut parameters =
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or(serde_json::Value::Null);
    if let Some(obj) = parameters.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    ToolSpec {
        name: name.to_string(),
        description: description.to_string(),
        parameters,
    }
}

/// Pull a required string field out of raw tool arguments.
pub(crate) fn string_arg(arguments: &str, field: &str) -> Result<String, String> {
    let value: serde_json::Value = serde_json::from_str(arguments)
        .map_err(|e| format!("tool arguments were not valid JSON: {e}"))?;
    match value.get(field) {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(serde_json::Value::String(_)) | None => {
            Err(format!("missing '{field}' argument"))
        }
        Some(other) => Err(format!("'{field}' must be a string, got {other}")),
    }
}
