//! Static evaluation: tapered material plus piece-square terms.
//!
//! Every term is computed from White's point of view and then flipped to the
//! side to move, so a position and its colour-mirrored twin always evaluate
//! to the same number.

mod material;
mod phase;
mod pst;

use std::ops::{AddAssign, SubAssign};

use chess::{ALL_PIECES, Board, Color};

pub use material::material_value;
pub use phase::{MAX_PHASE, game_phase};

/// Small bonus for having the move.
const TEMPO: i32 = 10;

/// A middlegame / endgame score pair, blended by game phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct Tapered {
    pub mg: i32,
    pub eg: i32,
}

impl Tapered {
    pub const ZERO: Tapered = Tapered { mg: 0, eg: 0 };

    pub const fn new(mg: i32, eg: i32) -> Tapered {
        Tapered { mg, eg }
    }

    /// Interpolate between the middlegame and endgame halves.
    fn blend(self, phase: i32) -> i32 {
        (self.mg * phase + self.eg * (MAX_PHASE - phase)) / MAX_PHASE
    }
}

impl AddAssign for Tapered {
    fn add_assign(&mut self, rhs: Tapered) {
        self.mg += rhs.mg;
        self.eg += rhs.eg;
    }
}

impl SubAssign for Tapered {
    fn sub_assign(&mut self, rhs: Tapered) {
        self.mg -= rhs.mg;
        self.eg -= rhs.eg;
    }
}

/// Evaluate `board` in centipawns from the side to move's perspective.
pub fn evaluate(board: &Board) -> i32 {
    let mut score = material::material(board);

    for piece in ALL_PIECES {
        let bb = *board.pieces(piece);
        for sq in bb & *board.color_combined(Color::White) {
            score += pst::pst_value(piece, Color::White, sq);
        }
        for sq in bb & *board.color_combined(Color::Black) {
            score -= pst::pst_value(piece, Color::Black, sq);
        }
    }

    let white_relative = score.blend(game_phase(board));
    let relative = match board.side_to_move() {
        Color::White => white_relative,
        Color::Black => -white_relative,
    };
    relative + TEMPO
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn board(fen: &str) -> Board {
        Board::from_str(fen).unwrap()
    }

    #[test]
    fn starting_position_is_balanced() {
        assert_eq!(evaluate(&Board::default()), TEMPO);
    }

    #[test]
    fn extra_queen_is_winning() {
        let b = board("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        assert!(evaluate(&b) > 800);
    }

    #[test]
    fn perspective_flips_with_side_to_move() {
        let white = board("4k3/8/8/8/8/8/8/3QK3 w - - 0 1");
        let black = board("4k3/8/8/8/8/8/8/3QK3 b - - 0 1");
        assert_eq!(evaluate(&white) - TEMPO, -(evaluate(&black) - TEMPO));
    }

    #[test]
    fn mirrored_positions_score_identically() {
        let pairs = [
            (
                "r1bqkb1r/pppp1ppp/2n2n2/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 4 4",
                "rnbqk2r/pppp1ppp/5n2/2b1p3/4P3/2N2N2/PPPP1PPP/R1BQKB1R b KQkq - 4 4",
            ),
            ("8/5k2/3p4/8/2P5/8/1K6/8 w - - 0 1", "8/1k6/8/2p5/8/3P4/5K2/8 b - - 0 1"),
        ];
        for (fen, mirrored) in pairs {
            assert_eq!(evaluate(&board(fen)), evaluate(&board(mirrored)), "{fen}");
        }
    }
}
