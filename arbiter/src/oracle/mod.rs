//! The position oracle boundary.
//!
//! An oracle answers three questions about a position: is it valid, what
//! is the evaluation after a given move, and (optionally) what would it
//! play itself. The arena only ever talks to `dyn PositionOracle`, so tests
//! can substitute a scripted oracle for the real engine.

pub mod uci;

use std::time::Duration;

use async_trait::async_trait;

use crate::eval::Evaluation;
use crate::moves::MoveCandidate;
use crate::position::Position;

pub use uci::{parse_info_score, EngineConfig, UciEngine};

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("invalid position: {0}")]
    InvalidPosition(String),

    #[error("illegal move '{mv}' in position '{fen}'")]
    IllegalMove { mv: String, fen: String },

    #[error("engine unavailable: {0}")]
    Unavailable(String),

    #[error("engine did not answer within {0:?}")]
    Timeout(Duration),

    #[error("engine protocol error: {0}")]
    Protocol(String),
}

impl OracleError {
    /// Illegal moves are the protocol's fault; everything else is ours.
    pub fn is_illegal(&self) -> bool {
        matches!(self, Self::IllegalMove { .. })
    }
}

/// Source of ground truth for positions and moves.
#[async_trait]
pub trait PositionOracle: Send + Sync {
    /// Reject positions that cannot be searched.
    async fn validate(&self, position: &Position) -> Result<(), OracleError>;

    /// Play `mv` in `position` and evaluate the result from the point of
    /// view of the side to move afterwards.
    async fn evaluate_after(
        &self,
        position: &Position,
        mv: &MoveCandidate,
    ) -> Result<Evaluation, OracleError>;

    /// The oracle's own preferred move, if it has one.
    async fn best_move(&self, _position: &Position) -> Result<Option<String>, OracleError> {
        Ok(None)
    }
}
