//! Move candidates as produced by the protocols.
//!
//! Only the *shape* of a move is checked here (4 or 5 ASCII alphanumerics).
//! Legality is the oracle's call.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Promotion pieces a model may spell in upper case.
const PROMOTION_PIECES: &[char] = &['Q', 'R', 'B', 'N'];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveShapeError {
    #[error("move is empty")]
    Empty,

    #[error("move '{0}' must be 4 or 5 characters long")]
    Length(String),

    #[error("move '{0}' must be alphanumeric")]
    NotAlphanumeric(String),
}

/// A syntactically plausible move in coordinate notation, e.g. `e2e4`, `e7e8q`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MoveCandidate(String);

impl MoveCandidate {
    /// Trim, shape-check and canonicalize a raw move string.
    pub fn parse(raw: &str) -> Result<Self, MoveShapeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(MoveShapeError::Empty);
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MoveShapeError::NotAlphanumeric(trimmed.to_string()));
        }
        if !(4..=5).contains(&trimmed.len()) {
            return Err(MoveShapeError::Length(trimmed.to_string()));
        }
        Ok(Self(canonicalize_promotion(trimmed)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for MoveCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for MoveCandidate {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lower-case a trailing promotion letter (`e7e8Q` → `e7e8q`).
///
/// Anything that is not a 5-character move ending in an upper-case
/// promotion piece is returned unchanged.
pub fn canonicalize_promotion(mv: &str) -> String {
    let mut chars: Vec<char> = mv.chars().collect();
    if chars.len() == 5 && PROMOTION_PIECES.contains(&chars[4]) {
        chars[4] = chars[4].to_ascii_lowercase();
    }
    chars.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_and_promotion_moves() {
        assert_eq!(MoveCandidate::parse("e2e4").unwrap().as_str(), "e2e4");
        assert_eq!(MoveCandidate::parse(" e7e8q ").unwrap().as_str(), "e7e8q");
    }

    #[test]
    fn lowercases_promotion_suffix() {
        assert_eq!(MoveCandidate::parse("a7a8Q").unwrap().as_str(), "a7a8q");
        assert_eq!(canonicalize_promotion("E7E8N"), "E7E8n");
        assert_eq!(canonicalize_promotion("e2e4"), "e2e4");
    }

    #[test]
    fn rejects_bad_shapes() {
        assert_eq!(MoveCandidate::parse(""), Err(MoveShapeError::Empty));
        assert!(matches!(
            MoveCandidate::parse("e2"),
            Err(MoveShapeError::Length(_))
        ));
        assert!(matches!(
            MoveCandidate::parse("e2e4e5"),
            Err(MoveShapeError::Length(_))
        ));
        assert!(matches!(
            MoveCandidate::parse("e2-e4"),
            Err(MoveShapeError::NotAlphanumeric(_))
        ));
    }

    #[test]
    fn serializes_as_plain_string() {
        let mv = MoveCandidate::parse("g1f3").unwrap();
        assert_eq!(serde_json::to_string(&mv).unwrap(), "\"g1f3\"");
    }
}
