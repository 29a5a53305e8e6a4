//! Chess council: LLM move-proposal protocols scored against an engine.
//!
//! Three protocols propose a move for each position:
//! - `structured`: one forced tool call
//! - `debate`: two personas argue for four rounds, the move is extracted from text
//! - `manager`: advisories, then a bounded manager loop with a verifier sub-call
//!
//! The [`arena::Arena`] runs them position by position, scores each move
//! through an [`arbiter::PositionOracle`] and awards a point to every
//! protocol tied for the best score.

pub mod arena;
pub mod config;
pub mod llm;
pub mod prompts;
pub mod protocols;

pub use arena::{Arena, ArenaSettings};
pub use config::{ConfigError, CouncilConfig};
pub use llm::{ChatBackend, ChatMessage, ChatReply, ChatRequest, LlmError, OpenAiChatClient};
pub use protocols::{
    DebateProtocol, FailureKind, ManagerProtocol, MoveProtocol, ProtocolError, StructuredProtocol,
};
