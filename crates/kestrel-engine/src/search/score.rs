//! Score bounds, mate encoding and the user-facing score type.

use std::fmt;

/// Maximum search ply; also the size of the per-ply stacks.
pub const MAX_PLY: usize = 128;

/// Deepest iteration the driver will start.
pub const MAX_DEPTH: u8 = 64;

/// Larger than any reachable score.
pub const INF: i32 = 30_000;

/// Score of delivering mate at the root. Mate found `n` plies deep scores `MATE_SCORE - n`.
pub const MATE_SCORE: i32 = 29_000;

/// Scores beyond this magnitude encode a forced mate.
pub const MATE_THRESHOLD: i32 = MATE_SCORE - MAX_PLY as i32;

/// Score of a drawn position.
pub const DRAW: i32 = 0;

/// Score for the side to move delivering mate `ply` plies from the root.
#[inline]
pub const fn mate_in(ply: usize) -> i32 {
    MATE_SCORE - ply as i32
}

/// Score for the side to move being mated `ply` plies from the root.
#[inline]
pub const fn mated_in(ply: usize) -> i32 {
    -MATE_SCORE + ply as i32
}

#[inline]
pub const fn is_mate_score(score: i32) -> bool {
    score.abs() >= MATE_THRESHOLD
}

/// A search score for display: centipawns, or a forced mate in full moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawns from the side to move's perspective.
    Cp(i32),
    /// Mate in this many moves; negative when the side to move is being mated.
    Mate(i32),
}

impl Score {
    /// Convert an internal search score.
    pub fn from_internal(score: i32) -> Score {
        if score >= MATE_THRESHOLD {
            let plies = MATE_SCORE - score;
            Score::Mate((plies + 1) / 2)
        } else if score <= -MATE_THRESHOLD {
            let plies = MATE_SCORE + score;
            Score::Mate(-((plies + 1) / 2))
        } else {
            Score::Cp(score)
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(cp) => write!(f, "cp {cp}"),
            Score::Mate(moves) => write!(f, "mate {moves}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mate_scores_convert_to_moves() {
        assert_eq!(Score::from_internal(mate_in(1)), Score::Mate(1));
        assert_eq!(Score::from_internal(mate_in(3)), Score::Mate(2));
        assert_eq!(Score::from_internal(mated_in(2)), Score::Mate(-1));
        assert_eq!(Score::from_internal(mated_in(0)), Score::Mate(0));
        assert_eq!(Score::from_internal(35), Score::Cp(35));
    }

    #[test]
    fn display() {
        assert_eq!(Score::Cp(-12).to_string(), "cp -12");
        assert_eq!(Score::Mate(3).to_string(), "mate 3");
    }

    #[test]
    fn every_mate_within_the_stack_is_recognised() {
        assert!(is_mate_score(mate_in(MAX_PLY)));
        assert!(is_mate_score(mated_in(MAX_PLY)));
        assert!(!is_mate_score(MATE_THRESHOLD - 1));
    }
}
