//! UCI engine oracle.
//!
//! Drives an external UCI engine (Stockfish by default) over stdin/stdout:
//!
//! ```text
//! spawn ──► uci ··· uciok ──► setoption Hash/Threads ──► isready ··· readyok
//!
//! validate(pos):
//!   shakmaty check ──► position fen <fen> ──► isready ··· readyok
//!
//! evaluate_after(pos, mv):
//!   shakmaty legality check ──► position fen <fen> moves <mv>
//!                           ──► go depth <d> ··· info … score cp|mate … ··· bestmove
//! ```
//!
//! The engine reports scores relative to the side to move in the searched
//! position, which after `moves <mv>` is the opponent of the mover. That is
//! exactly the convention of [`Evaluation`]. The engine always receives
//! [`Position::engine_fen`], so its castling rights match the legality check.
//!
//! A process that errors or times out is dropped (and killed) and a fresh
//! one is spawned on the next request.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shakmaty::{CastlingMode, Position as _};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{OracleError, PositionOracle};
use crate::eval::Evaluation;
use crate::moves::MoveCandidate;
use crate::position::Position;

/// Engine process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Engine executable (`STOCKFISH_PATH`, default `stockfish`).
    pub path: PathBuf,
    /// Fixed search depth for every evaluation.
    pub depth: u32,
    pub hash_mb: u32,
    pub threads: u32,
    /// Limit for one search, from `position` to `bestmove`.
    pub eval_timeout_secs: u64,
    /// Limit for the `uci`/`isready` handshake.
    pub handshake_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: std::env::var("STOCKFISH_PATH")
                .unwrap_or_else(|_| "stockfish".into())
                .into(),
            depth: 15,
            hash_mb: 128,
            threads: 1,
            eval_timeout_secs: 30,
            handshake_timeout_secs: 10,
        }
    }
}

impl EngineConfig {
    pub fn eval_timeout(&self) -> Duration {
        Duration::from_secs(self.eval_timeout_secs)
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// What one `go` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SearchOutcome {
    score: Option<Evaluation>,
    best_move: Option<String>,
}

/// A running engine with its pipes.
struct EngineProcess {
    _child: Child,
    stdin: ChildStdin,
    lines: Lines<BufReader<ChildStdout>>,
}

impl EngineProcess {
    async fn spawn(config: &EngineConfig) -> Result<Self, OracleError> {
        let mut child = Command::new(&config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                OracleError::Unavailable(format!(
                    "failed to spawn '{}': {e}",
                    config.path.display()
                ))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| OracleError::Unavailable("engine stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| OracleError::Unavailable("engine stdout not captured".into()))?;

        let mut process = Self {
            _child: child,
            stdin,
            lines: BufReader::new(stdout).lines(),
        };

        let limit = config.handshake_timeout();
        match tokio::time::timeout(limit, process.handshake(config)).await {
            Ok(result) => result?,
            Err(_) => return Err(OracleError::Timeout(limit)),
        }

        info!(path = %config.path.display(), depth = config.depth, "engine ready");
        Ok(process)
    }

    async fn handshake(&mut self, config: &EngineConfig) -> Result<(), OracleError> {
        self.send("uci").await?;
        self.wait_for("uciok").await?;
        self.send(&format!("setoption name Hash value {}", config.hash_mb))
            .await?;
        self.send(&format!("setoption name Threads value {}", config.threads))
            .await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    async fn send(&mut self, command: &str) -> Result<(), OracleError> {
        debug!(command, "→ engine");
        self.stdin
            .write_all(format!("{command}\n").as_bytes())
            .await
            .map_err(|e| OracleError::Unavailable(format!("write to engine failed: {e}")))?;
        self.stdin
            .flush()
            .await
            .map_err(|e| OracleError::Unavailable(format!("flush to engine failed: {e}")))
    }

    async fn read_line(&mut self) -> Result<String, OracleError> {
        match self.lines.next_line().await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(OracleError::Unavailable("engine closed its output".into())),
            Err(e) => Err(OracleError::Unavailable(format!(
                "read from engine failed: {e}"
            ))),
        }
    }

    async fn wait_for(&mut self, token: &str) -> Result<(), OracleError> {
        loop {
            if self.read_line().await?.trim() == token {
                return Ok(());
            }
        }
    }

    async fn sync_position(&mut self, fen: &str) -> Result<(), OracleError> {
        self.send(&format!("position fen {fen}")).await?;
        self.send("isready").await?;
        self.wait_for("readyok").await
    }

    async fn search(
        &mut self,
        fen: &str,
        mv: Option<&str>,
        depth: u32,
    ) -> Result<SearchOutcome, OracleError> {
        let command = match mv {
            Some(mv) => format!("position fen {fen} moves {mv}"),
            None => format!("position fen {fen}"),
        };
        self.send(&command).await?;
        self.send(&format!("go depth {depth}")).await?;

        let mut score = None;
        loop {
            let line = self.read_line().await?;
            if line.starts_with("info") {
                if let Some(eval) = parse_info_score(&line) {
                    score = Some(eval);
                }
            } else if let Some(rest) = line.strip_prefix("bestmove") {
                let best_move = rest
                    .split_whitespace()
                    .next()
                    .filter(|m| *m != "(none)")
                    .map(str::to_string);
                return Ok(SearchOutcome { score, best_move });
            }
        }
    }
}

/// Extract the score from a UCI `info` line.
///
/// Bound-only scores (`lowerbound`/`upperbound`) are ignored because they
/// are not the engine's settled opinion at that depth.
pub fn parse_info_score(line: &str) -> Option<Evaluation> {
    let mut tokens = line.split_whitespace();
    while let Some(token) = tokens.next() {
        if token != "score" {
            continue;
        }
        let kind = tokens.next()?;
        let value: i32 = tokens.next()?.parse().ok()?;
        if matches!(tokens.next(), Some("lowerbound" | "upperbound")) {
            return None;
        }
        return match kind {
            "cp" => Some(Evaluation::Centipawns(value)),
            "mate" => Some(Evaluation::Mate(value)),
            _ => None,
        };
    }
    None
}

/// [`PositionOracle`] backed by a UCI engine process.
pub struct UciEngine {
    config: EngineConfig,
    process: Mutex<Option<EngineProcess>>,
}

impl UciEngine {
    /// Create the oracle without starting the engine; the first request
    /// spawns it.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            process: Mutex::new(None),
        }
    }

    /// Create the oracle and start the engine immediately so that a missing
    /// binary is reported at startup.
    pub async fn start(config: EngineConfig) -> Result<Self, OracleError> {
        let process = EngineProcess::spawn(&config).await?;
        Ok(Self {
            config,
            process: Mutex::new(Some(process)),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The running process, spawning one if the last was dropped.
    async fn running<'a>(
        &self,
        slot: &'a mut Option<EngineProcess>,
    ) -> Result<&'a mut EngineProcess, OracleError> {
        if slot.is_none() {
            warn!("engine not running; spawning");
            *slot = Some(EngineProcess::spawn(&self.config).await?);
        }
        slot.as_mut()
            .ok_or_else(|| OracleError::Unavailable("engine not running".into()))
    }

    async fn search(&self, fen: &str, mv: Option<&str>) -> Result<SearchOutcome, OracleError> {
        let mut guard = self.process.lock().await;
        let process = self.running(&mut guard).await?;

        let limit = self.config.eval_timeout();
        let result = match tokio::time::timeout(limit, process.search(fen, mv, self.config.depth))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(limit)),
        };

        if let Err(e) = &result {
            warn!(error = %e, "dropping engine process");
            *guard = None;
        }
        result
    }

    /// Load `fen` into the engine and wait until it reports ready again.
    async fn load_position(&self, fen: &str) -> Result<(), OracleError> {
        let mut guard = self.process.lock().await;
        let process = self.running(&mut guard).await?;

        let limit = self.config.handshake_timeout();
        let result = match tokio::time::timeout(limit, process.sync_position(fen)).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout(limit)),
        };

        if let Err(e) = &result {
            warn!(error = %e, fen, "engine failed on position; dropping process");
            *guard = None;
        }
        result
    }
}

#[async_trait]
impl PositionOracle for UciEngine {
    async fn validate(&self, position: &Position) -> Result<(), OracleError> {
        position
            .to_chess()
            .map_err(|e| OracleError::InvalidPosition(e.to_string()))?;
        self.load_position(position.engine_fen()).await
    }

    async fn evaluate_after(
        &self,
        position: &Position,
        mv: &MoveCandidate,
    ) -> Result<Evaluation, OracleError> {
        let chess = position
            .to_chess()
            .map_err(|e| OracleError::InvalidPosition(e.to_string()))?;

        let legal = chess
            .legal_moves()
            .iter()
            .any(|m| m.to_uci(CastlingMode::Standard).to_string() == mv.as_str());
        if !legal {
            return Err(OracleError::IllegalMove {
                mv: mv.to_string(),
                fen: position.fen().to_string(),
            });
        }

        let outcome = self
            .search(position.engine_fen(), Some(mv.as_str()))
            .await?;
        outcome.score.ok_or_else(|| {
            OracleError::Protocol(format!("no score reported after {mv}"))
        })
    }

    async fn best_move(&self, position: &Position) -> Result<Option<String>, OracleError> {
        Ok(self.search(position.engine_fen(), None).await?.best_move)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn parses_centipawn_and_mate_scores() {
        assert_eq!(
            parse_info_score("info depth 15 seldepth 20 multipv 1 score cp -34 nodes 1 pv e7e5"),
            Some(Evaluation::Centipawns(-34))
        );
        assert_eq!(
            parse_info_score("info depth 7 score mate -2 nodes 100 pv a1a2"),
            Some(Evaluation::Mate(-2))
        );
        assert_eq!(
            parse_info_score("info depth 0 score mate 0"),
            Some(Evaluation::Mate(0))
        );
    }

    #[test]
    fn ignores_bounds_and_scoreless_lines() {
        assert_eq!(parse_info_score("info depth 12 score cp 20 lowerbound"), None);
        assert_eq!(parse_info_score("info depth 12 score cp 20 upperbound"), None);
        assert_eq!(parse_info_score("info string NNUE enabled"), None);
        assert_eq!(parse_info_score("info depth 3 score cp"), None);
    }

    #[tokio::test]
    async fn illegal_move_rejected_without_engine() {
        // Points at a binary that does not exist: legality is decided first.
        let engine = UciEngine::new(EngineConfig {
            path: "/nonexistent/engine".into(),
            ..EngineConfig::default()
        });
        let pos = Position::parse(START).unwrap();
        let mv = MoveCandidate::parse("e2e5").unwrap();
        let err = engine.evaluate_after(&pos, &mv).await.unwrap_err();
        assert!(err.is_illegal());
    }

    #[tokio::test]
    async fn missing_binary_is_unavailable() {
        let engine = UciEngine::new(EngineConfig {
            path: "/nonexistent/engine".into(),
            ..EngineConfig::default()
        });
        let pos = Position::parse(START).unwrap();
        let mv = MoveCandidate::parse("e2e4").unwrap();
        let err = engine.evaluate_after(&pos, &mv).await.unwrap_err();
        assert!(matches!(err, OracleError::Unavailable(_)));
    }

    #[tokio::test]
    async fn stale_castling_rights_do_not_block_evaluation() {
        let engine = UciEngine::new(EngineConfig {
            path: "/nonexistent/engine".into(),
            ..EngineConfig::default()
        });
        let pos = Position::parse("r3k2r/8/8/8/8/8/8/4K3 w KQkq - 0 1").unwrap();

        // Castling with the dropped rights is illegal; a king step reaches the engine.
        let castle = MoveCandidate::parse("e1g1").unwrap();
        assert!(engine.evaluate_after(&pos, &castle).await.unwrap_err().is_illegal());
        let step = MoveCandidate::parse("e1f1").unwrap();
        assert!(matches!(
            engine.evaluate_after(&pos, &step).await.unwrap_err(),
            OracleError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn validate_consults_the_engine() {
        let engine = UciEngine::new(EngineConfig {
            path: "/nonexistent/engine".into(),
            ..EngineConfig::default()
        });
        let pos = Position::parse(START).unwrap();
        assert!(matches!(
            engine.validate(&pos).await,
            Err(OracleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    #[ignore = "needs a stockfish binary on PATH"]
    async fn real_engine_scores_opening_move() {
        let engine = UciEngine::start(EngineConfig {
            depth: 8,
            ..EngineConfig::default()
        })
        .await
        .unwrap();
        let pos = Position::parse(START).unwrap();
        engine.validate(&pos).await.unwrap();
        let mv = MoveCandidate::parse("e2e4").unwrap();
        let eval = engine.evaluate_after(&pos, &mv).await.unwrap();
        assert!(matches!(eval, Evaluation::Centipawns(cp) if cp.abs() < 200));
        assert!(engine.best_move(&pos).await.unwrap().is_some());
    }
}
