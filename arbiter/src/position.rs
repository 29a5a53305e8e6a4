//! Positions, sides, and the anchor-side policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, EnPassantMode, Setup};

/// One of the two players.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

/// Why a position string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("empty position string")]
    Empty,

    #[error("unparsable FEN '{fen}': {reason}")]
    Unparsable { fen: String, reason: String },

    #[error("illegal position '{fen}': {reason}")]
    Illegal { fen: String, reason: String },
}

/// A validated, immutable FEN position.
///
/// Construction goes through [`Position::parse`], which requires the FEN to
/// parse and to describe a legal position. Stale castling rights and en
/// passant squares are tolerated and dropped. The original text is kept
/// as-is (trimmed) for prompts and reports; the engine gets the cleaned-up
/// FEN so it sees the same rights the legality check used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    fen: String,
    #[serde(skip)]
    engine_fen: String,
    side_to_move: Side,
}

impl Position {
    pub fn parse(raw: &str) -> Result<Self, PositionError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(PositionError::Empty);
        }

        let setup = parse_setup(text)?;
        let side_to_move = if setup.turn.is_black() {
            Side::Black
        } else {
            Side::White
        };

        let chess = build_chess(setup, text)?;

        Ok(Self {
            fen: text.to_string(),
            engine_fen: Fen::from_position(&chess, EnPassantMode::Legal).to_string(),
            side_to_move,
        })
    }

    pub fn fen(&self) -> &str {
        &self.fen
    }

    /// Normalized FEN: only the castling rights and en passant square that
    /// are actually valid.
    pub fn engine_fen(&self) -> &str {
        &self.engine_fen
    }

    pub fn side_to_move(&self) -> Side {
        self.side_to_move
    }

    /// Rebuild the playable board for move-legality queries.
    pub fn to_chess(&self) -> Result<Chess, PositionError> {
        build_chess(parse_setup(&self.fen)?, &self.fen)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen)
    }
}

fn parse_setup(text: &str) -> Result<Setup, PositionError> {
    let fen: Fen = text.parse().map_err(|e: shakmaty::fen::ParseFenError| {
        PositionError::Unparsable {
            fen: text.to_string(),
            reason: e.to_string(),
        }
    })?;
    Ok(fen.into())
}

/// Reject impossible positions (missing king, opponent in check, ...) but
/// drop invalid castling rights and en passant squares instead of failing.
fn build_chess(setup: Setup, text: &str) -> Result<Chess, PositionError> {
    setup
        .position::<Chess>(CastlingMode::Standard)
        .or_else(shakmaty::PositionError::ignore_invalid_castling_rights)
        .or_else(shakmaty::PositionError::ignore_invalid_ep_square)
        .map_err(|e| PositionError::Illegal {
            fen: text.to_string(),
            reason: e.to_string(),
        })
}

/// Which side scores are expressed relative to.
///
/// `SideToMove` makes the anchor the side choosing the move in each
/// position, so "better" always means "higher". A fixed colour keeps one
/// reference frame for the whole run; positions where the other colour is
/// to move are then judged by the lowest score instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnchorPolicy {
    #[default]
    SideToMove,
    White,
    Black,
}

impl AnchorPolicy {
    pub fn anchor_for(self, position: &Position) -> Side {
        match self {
            Self::SideToMove => position.side_to_move(),
            Self::White => Side::White,
            Self::Black => Side::Black,
        }
    }
}

impl fmt::Display for AnchorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SideToMove => write!(f, "side-to-move"),
            Self::White => write!(f, "white"),
            Self::Black => write!(f, "black"),
        }
    }
}

impl FromStr for AnchorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "side-to-move" | "side_to_move" | "mover" => Ok(Self::SideToMove),
            "white" => Ok(Self::White),
            "black" => Ok(Self::Black),
            other => Err(format!(
                "unknown anchor policy '{other}' (expected side-to-move, white or black)"
            )),
        }
    }
}
