//! The arbitration loop.
//!
//! ```text
//! for each position (strictly in order, Ctrl-C checked between positions):
//!   parse + oracle.validate ──✗──► skipped (no points, nothing attempted)
//!   for each protocol (one after another):
//!     decide (with timeout) ──✗──► sentinel, malformed or errored
//!     oracle.evaluate_after ──✗──► sentinel, illegal or errored
//!     frame.normalize(eval) ─────► anchor-relative score
//!   arbitrate(frame.direction(), scores) ──► winners ──► Scoreboard
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter::{
    arbitrate, AnchorPolicy, OutcomeFailure, Position, PositionOracle, PositionReport,
    ProtocolOutcome, RunSummary, Scoreboard, ScoringFrame,
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::RunConfig;
use crate::protocols::{MoveProtocol, ProtocolError};

#[derive(Debug, Clone)]
pub struct ArenaSettings {
    pub anchor: AnchorPolicy,
    pub protocol_timeout: Duration,
    pub record_engine_best: bool,
}

impl Default for ArenaSettings {
    fn default() -> Self {
        Self::from(&RunConfig::default())
    }
}

impl From<&RunConfig> for ArenaSettings {
    fn from(run: &RunConfig) -> Self {
        Self {
            anchor: run.anchor,
            protocol_timeout: run.protocol_timeout(),
            record_engine_best: run.record_engine_best,
        }
    }
}

pub struct Arena {
    protocols: Vec<Arc<dyn MoveProtocol>>,
    oracle: Arc<dyn PositionOracle>,
    settings: ArenaSettings,
}

impl Arena {
    pub fn new(
        protocols: Vec<Arc<dyn MoveProtocol>>,
        oracle: Arc<dyn PositionOracle>,
        settings: ArenaSettings,
    ) -> Self {
        Self {
            protocols,
            oracle,
            settings,
        }
    }

    pub fn protocol_names(&self) -> Vec<String> {
        self.protocols.iter().map(|p| p.name().to_string()).collect()
    }

    /// Score every position in order. `sink` sees each position's report as
    /// soon as it is complete.
    pub async fn run(
        &self,
        positions: &[String],
        cancel: &CancellationToken,
        mut sink: impl FnMut(&PositionReport),
    ) -> RunSummary {
        let run_id = Uuid::new_v4();
        let mut summary = RunSummary::new(run_id, Utc::now(), self.settings.anchor, positions.len());
        let mut board = Scoreboard::new(self.protocol_names());
        info!(%run_id, positions = positions.len(), anchor = %self.settings.anchor, "run starting");

        for (index, raw) in positions.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(scored = summary.positions_scored, "run cancelled; stopping before next position");
                summary.cancelled = true;
                break;
            }

            info!(position = index + 1, total = positions.len(), fen = %raw, "scoring position");
            let report = self.score_position(run_id, index, raw).await;
            if report.skipped.is_some() {
                summary.positions_skipped += 1;
            } else {
                board.record(&report.outcomes);
                summary.positions_scored += 1;
            }
            sink(&report);
        }

        if !board.any_attempted() {
            warn!(
                skipped = summary.positions_skipped,
                "no positions were processed by any protocol"
            );
        }
        summary.finish(&board);
        summary
    }

    /// Score one position. Never fails: every problem ends up in the report.
    pub async fn score_position(&self, run_id: Uuid, index: usize, raw: &str) -> PositionReport {
        let position = match Position::parse(raw) {
            Ok(p) => p,
            Err(e) => {
                warn!(position = index + 1, error = %e, "skipping position");
                return PositionReport::skipped(run_id, index, raw.trim(), e.to_string());
            }
        };
        if let Err(e) = self.oracle.validate(&position).await {
            warn!(position = index + 1, error = %e, "oracle rejected position; skipping");
            return PositionReport::skipped(run_id, index, position.fen(), e.to_string());
        }

        let frame = ScoringFrame::new(&position, self.settings.anchor);
        let mut outcomes = Vec::with_capacity(self.protocols.len());
        for protocol in &self.protocols {
            outcomes.push(self.run_protocol(protocol.as_ref(), &position, &frame).await);
        }

        let scores: Vec<f64> = outcomes.iter().map(|o| o.score).collect();
        let winners = arbitrate(frame.direction(), &scores);
        for &i in &winners {
            outcomes[i].winner = true;
        }
        if winners.is_empty() {
            info!(position = index + 1, "no evaluable move; no points awarded");
        } else {
            let names: Vec<&str> = winners.iter().map(|&i| outcomes[i].protocol.as_str()).collect();
            info!(position = index + 1, best = scores[winners[0]], winners = ?names, "points awarded");
        }

        let engine_best = if self.settings.record_engine_best {
            match self.oracle.best_move(&position).await {
                Ok(mv) => mv,
                Err(e) => {
                    warn!(error = %e, "engine reference move unavailable");
                    None
                }
            }
        } else {
            None
        };

        PositionReport {
            run_id,
            index,
            fen: position.fen().to_string(),
            skipped: None,
            anchor: Some(frame.anchor),
            direction: Some(frame.direction()),
            outcomes,
            engine_best,
        }
    }

    async fn run_protocol(
        &self,
        protocol: &dyn MoveProtocol,
        position: &Position,
        frame: &ScoringFrame,
    ) -> ProtocolOutcome {
        let name = protocol.name();
        let started = Instant::now();
        let limit = self.settings.protocol_timeout;

        let decided = match tokio::time::timeout(limit, protocol.decide(position)).await {
            Ok(result) => result,
            Err(_) => Err(ProtocolError::Timeout(limit)),
        };

        let outcome = match decided {
            Err(e) => {
                warn!(protocol = name, kind = %e.kind(), error = %e, "protocol failed");
                let failure = if e.is_malformed() {
                    OutcomeFailure::Malformed(e.to_string())
                } else {
                    OutcomeFailure::Errored(e.to_string())
                };
                ProtocolOutcome::unscored(name, None, failure, frame.sentinel())
            }
            Ok(mv) => match self.oracle.evaluate_after(position, &mv).await {
                Ok(eval) => {
                    let score = frame.normalize(eval);
                    info!(protocol = name, mv = %mv, ?eval, score, "move scored");
                    ProtocolOutcome::scored(name, mv.as_str(), eval, score)
                }
                Err(e) => {
                    warn!(protocol = name, mv = %mv, error = %e, "move could not be evaluated");
                    let failure = if e.is_illegal() {
                        OutcomeFailure::Illegal(e.to_string())
                    } else {
                        OutcomeFailure::Errored(e.to_string())
                    };
                    ProtocolOutcome::unscored(
                        name,
                        Some(mv.into_string()),
                        failure,
                        frame.sentinel(),
                    )
                }
            },
        };

        outcome.with_elapsed_ms(u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX))
    }
}
