//! Run output: the append-only summary block and the per-position JSONL report.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::position::{AnchorPolicy, Side};
use crate::tally::{Direction, ProtocolOutcome, ProtocolTally, Scoreboard};

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything known about one scored (or skipped) position.
#[derive(Debug, Clone, Serialize)]
pub struct PositionReport {
    pub run_id: Uuid,
    pub index: usize,
    pub fen: String,
    /// Present when the position could not be scored at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outcomes: Vec<ProtocolOutcome>,
    /// The oracle's own choice, for offline comparison only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_best: Option<String>,
}

impl PositionReport {
    pub fn skipped(run_id: Uuid, index: usize, fen: impl Into<String>, reason: String) -> Self {
        Self {
            run_id,
            index,
            fen: fen.into(),
            skipped: Some(reason),
            anchor: None,
            direction: None,
            outcomes: Vec::new(),
            engine_best: None,
        }
    }

    pub fn winners(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| o.winner)
            .map(|o| o.protocol.as_str())
    }
}

/// Appends one JSON object per line.
pub struct ReportWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ReportWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReportError> {
        let path = path.as_ref().to_path_buf();
        let file = append_handle(&path)?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, report: &PositionReport) -> Result<(), ReportError> {
        let line = serde_json::to_string(report)?;
        writeln!(self.out, "{line}")
            .and_then(|_| self.out.flush())
            .map_err(|source| ReportError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// End-of-run totals.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub anchor: AnchorPolicy,
    pub positions_total: usize,
    pub positions_scored: usize,
    pub positions_skipped: usize,
    /// True when the run stopped early on Ctrl-C.
    pub cancelled: bool,
    pub tallies: Vec<ProtocolTally>,
}

impl RunSummary {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        anchor: AnchorPolicy,
        positions_total: usize,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            anchor,
            positions_total,
            positions_scored: 0,
            positions_skipped: 0,
            cancelled: false,
            tallies: Vec::new(),
        }
    }

    pub fn finish(&mut self, scoreboard: &Scoreboard) {
        self.finished_at = Utc::now();
        self.tallies = scoreboard.tallies().to_vec();
    }

    /// Human-readable block. Per protocol the fields appear as: name,
    /// points/attempted, percentage, malformed, errored.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== run {} ===", self.run_id);
        let _ = writeln!(
            out,
            "started:  {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let _ = writeln!(
            out,
            "finished: {}{}",
            self.finished_at.format("%Y-%m-%d %H:%M:%S UTC"),
            if self.cancelled { " (cancelled)" } else { "" }
        );
        let _ = writeln!(out, "anchor:   {}", self.anchor);
        let _ = writeln!(
            out,
            "positions: {} scored, {} skipped, {} total",
            self.positions_scored, self.positions_skipped, self.positions_total
        );
        for t in &self.tallies {
            let _ = writeln!(
                out,
                "{:<12} {:>4}/{:<4} {:>7.2}%  malformed={}  errored={}",
                t.name,
                t.total_points,
                t.positions_attempted,
                t.win_percentage(),
                t.malformed_count,
                t.errored_count,
            );
        }
        out
    }

    /// Append the rendered block (plus a blank separator line) to `path`.
    pub fn append_to(&self, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let path = path.as_ref();
        let mut file = append_handle(path)?;
        writeln!(file, "{}", self.render()).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn append_handle(path: &Path) -> Result<File, ReportError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ReportError::Open {
            path: path.to_path_buf(),
            source,
        })
}
