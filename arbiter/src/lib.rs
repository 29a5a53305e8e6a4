//! Arbiter: deterministic scoring for competing move-proposal protocols
//!
//! This library holds everything in the experiment that does not talk to a
//! language model:
//! - Position and move types with the syntactic checks every protocol shares
//! - The scoring normalizer that maps engine evaluations onto one scale
//! - The `PositionOracle` boundary and a UCI-engine implementation
//! - The per-protocol scoreboard and the best-score arbitration rule
//! - Position loading and the append-only run summary
//!
//! # Scoring flow
//!
//! ```text
//! Position ──► protocol proposes MoveCandidate
//!                 │
//!                 ▼
//!          PositionOracle::evaluate_after ──► Evaluation (next mover's view)
//!                 │
//!                 ▼
//!          ScoringFrame::normalize ──► anchor-relative score (f64)
//!                 │
//!                 ▼
//!          arbitrate(direction, scores) ──► winners ──► Scoreboard
//! ```

pub mod eval;
pub mod moves;
pub mod oracle;
pub mod position;
pub mod positions;
pub mod report;
pub mod tally;

pub use eval::{normalize, Evaluation, ScoringFrame, CENTIPAWN_CEILING, MATE_SCORE};
pub use moves::{MoveCandidate, MoveShapeError};
pub use oracle::{EngineConfig, OracleError, PositionOracle, UciEngine};
pub use position::{AnchorPolicy, Position, PositionError, Side};
pub use positions::load_positions;
pub use report::{PositionReport, ReportError, ReportWriter, RunSummary};
pub use tally::{
    arbitrate, Direction, OutcomeFailure, ProtocolOutcome, ProtocolTally, Scoreboard,
    SCORE_TOLERANCE,
};
