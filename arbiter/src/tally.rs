//! Best-score arbitration and the per-protocol running tally.
//!
//! For every position each protocol ends up with one anchor-relative score
//! (or the sentinel for "could not be evaluated"). Every protocol tied with
//! the best score gets a point. A position whose best score is a sentinel
//! awards nothing.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::eval::Evaluation;

/// Two scores closer than this are a tie.
pub const SCORE_TOLERANCE: f64 = 1e-9;

/// Which extreme of the anchor-relative scale is best for the mover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// The worst possible score in this direction (used as the sentinel).
    pub fn worst(self) -> f64 {
        match self {
            Self::Maximize => f64::NEG_INFINITY,
            Self::Minimize => f64::INFINITY,
        }
    }

    fn best_of(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Maximize => a.max(b),
            Self::Minimize => a.min(b),
        }
    }
}

/// Indices of every score tied for best, or empty when nothing evaluable won.
pub fn arbitrate(direction: Direction, scores: &[f64]) -> Vec<usize> {
    let best = scores
        .iter()
        .copied()
        .filter(|s| !s.is_nan())
        .fold(direction.worst(), |acc, s| direction.best_of(acc, s));

    if !best.is_finite() {
        return Vec::new();
    }

    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| (**s - best).abs() < SCORE_TOLERANCE)
        .map(|(i, _)| i)
        .collect()
}

/// Why a protocol's proposal could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum OutcomeFailure {
    /// The protocol produced no usable move (bad shape, nothing extractable).
    Malformed(String),
    /// The oracle rejected the move for this position.
    Illegal(String),
    /// Transport failure, timeout, exhaustion, or oracle unavailable.
    Errored(String),
}

impl OutcomeFailure {
    /// Whether this failure counts against the protocol's malformed tally.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Self::Malformed(_) | Self::Illegal(_))
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::Malformed(r) | Self::Illegal(r) | Self::Errored(r) => r,
        }
    }
}

/// What one protocol achieved on one position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolOutcome {
    pub protocol: String,
    pub proposed_move: Option<String>,
    pub evaluation: Option<Evaluation>,
    /// Anchor-relative score; the frame's sentinel when unscorable.
    pub score: f64,
    pub failure: Option<OutcomeFailure>,
    pub elapsed_ms: u64,
    pub winner: bool,
}

impl ProtocolOutcome {
    pub fn scored(
        protocol: impl Into<String>,
        proposed_move: impl Into<String>,
        evaluation: Evaluation,
        score: f64,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            proposed_move: Some(proposed_move.into()),
            evaluation: Some(evaluation),
            score,
            failure: None,
            elapsed_ms: 0,
            winner: false,
        }
    }

    pub fn unscored(
        protocol: impl Into<String>,
        proposed_move: Option<String>,
        failure: OutcomeFailure,
        sentinel: f64,
    ) -> Self {
        Self {
            protocol: protocol.into(),
            proposed_move,
            evaluation: None,
            score: sentinel,
            failure: Some(failure),
            elapsed_ms: 0,
            winner: false,
        }
    }

    pub fn with_elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = elapsed_ms;
        self
    }
}

/// Running totals for one protocol across the whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolTally {
    pub name: String,
    pub total_points: u32,
    pub positions_attempted: u32,
    pub malformed_count: u32,
    pub errored_count: u32,
}

impl ProtocolTally {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Share of attempted positions where this protocol tied for best.
    pub fn win_percentage(&self) -> f64 {
        if self.positions_attempted == 0 {
            0.0
        } else {
            f64::from(self.total_points) / f64::from(self.positions_attempted) * 100.0
        }
    }

    fn record(&mut self, outcome: &ProtocolOutcome) {
        self.positions_attempted += 1;
        if outcome.winner {
            self.total_points += 1;
        }
        match &outcome.failure {
            Some(f) if f.is_malformed() => self.malformed_count += 1,
            Some(_) => self.errored_count += 1,
            None => {}
        }
    }
}

/// The only state that survives from one position to the next.
///
/// Owned by the driving loop and threaded through it explicitly; a parallel
/// driver must wrap it in a lock and call [`Scoreboard::record`] once per
/// finished position.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scoreboard {
    tallies: Vec<ProtocolTally>,
}

impl Scoreboard {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tallies: names.into_iter().map(ProtocolTally::new).collect(),
        }
    }

    /// Fold one position's outcomes into the tallies, matched by protocol name.
    pub fn record(&mut self, outcomes: &[ProtocolOutcome]) {
        for outcome in outcomes {
            match self.tallies.iter_mut().find(|t| t.name == outcome.protocol) {
                Some(tally) => tally.record(outcome),
                None => {
                    warn!(protocol = %outcome.protocol, "outcome for unregistered protocol; adding tally");
                    let mut tally = ProtocolTally::new(outcome.protocol.clone());
                    tally.record(outcome);
                    self.tallies.push(tally);
                }
            }
        }
    }

    pub fn tallies(&self) -> &[ProtocolTally] {
        &self.tallies
    }

    pub fn get(&self, name: &str) -> Option<&ProtocolTally> {
        self.tallies.iter().find(|t| t.name == name)
    }

    pub fn any_attempted(&self) -> bool {
        self.tallies.iter().any(|t| t.positions_attempted > 0)
    }
}
