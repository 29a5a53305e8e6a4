//! Scoring normalizer.
//!
//! Engine evaluations arrive relative to the side to move *after* the
//! proposed move, i.e. the opponent of whoever just moved. Normalization
//! turns them into one anchor-relative number so that scores from different
//! protocols (and different kinds of evaluation) can be compared directly.
//!
//! | Evaluation (next mover's view) | Score for the side that just moved |
//! |--------------------------------|------------------------------------|
//! | `Centipawns(v)`                | `-v` (clamped to ±`CENTIPAWN_CEILING`) |
//! | `Mate(0)` (next mover is mated)| `+MATE_SCORE`                      |
//! | `Mate(n)`, n > 0               | `-MATE_SCORE + n`                  |
//! | `Mate(-n)`                     | `+MATE_SCORE - n`                  |
//!
//! The mover's score is then negated when the mover is not the anchor.

use serde::{Deserialize, Serialize};

use crate::position::{AnchorPolicy, Position, Side};
use crate::tally::Direction;

/// Magnitude assigned to a delivered checkmate.
pub const MATE_SCORE: f64 = 100_000.0;

/// Mate distances beyond this are treated as this distance.
pub const MATE_DISTANCE_CAP: u32 = 10_000;

/// Ordinary evaluations are clamped into `±CENTIPAWN_CEILING`, which keeps
/// every forced-mate score strictly outside the numeric range.
pub const CENTIPAWN_CEILING: f64 = 50_000.0;

/// A static evaluation, always from the side to move in the evaluated position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Evaluation {
    /// Ordinary score in centipawns.
    Centipawns(i32),
    /// Forced mate in `n` plies; positive when the side to move mates,
    /// negative when it gets mated, zero when it is already checkmated.
    Mate(i32),
}

impl Evaluation {
    /// Score from the perspective of the side that made the last move.
    pub fn mover_score(self) -> f64 {
        match self {
            // `+ 0.0` folds a negated zero back to +0.0.
            Self::Centipawns(cp) => -f64::from(cp).clamp(-CENTIPAWN_CEILING, CENTIPAWN_CEILING) + 0.0,
            Self::Mate(0) => MATE_SCORE,
            Self::Mate(n) if n > 0 => -MATE_SCORE + mate_distance(n),
            Self::Mate(n) => MATE_SCORE - mate_distance(n),
        }
    }
}

fn mate_distance(n: i32) -> f64 {
    f64::from(n.unsigned_abs().min(MATE_DISTANCE_CAP))
}

/// Map an evaluation onto the anchor-relative scale.
///
/// `mover_is_anchor` says whether the side that just moved is the anchor.
pub fn normalize(eval: Evaluation, mover_is_anchor: bool) -> f64 {
    let score = eval.mover_score();
    if mover_is_anchor {
        score
    } else {
        -score + 0.0
    }
}

/// Per-position scoring context: who is anchored and who is choosing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoringFrame {
    pub anchor: Side,
    pub mover: Side,
}

impl ScoringFrame {
    pub fn new(position: &Position, policy: AnchorPolicy) -> Self {
        Self {
            anchor: policy.anchor_for(position),
            mover: position.side_to_move(),
        }
    }

    pub fn mover_is_anchor(&self) -> bool {
        self.anchor == self.mover
    }

    /// Which extreme is best for the side choosing the move.
    pub fn direction(&self) -> Direction {
        if self.mover_is_anchor() {
            Direction::Maximize
        } else {
            Direction::Minimize
        }
    }

    /// Score given to a protocol whose move could not be evaluated.
    pub fn sentinel(&self) -> f64 {
        self.direction().worst()
    }

    pub fn normalize(&self, eval: Evaluation) -> f64 {
        normalize(eval, self.mover_is_anchor())
    }
}
