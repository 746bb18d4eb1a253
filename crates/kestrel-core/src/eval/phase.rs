//! Game phase from remaining non-pawn material.

use chess::{Board, Piece};

/// Phase of a full set of minor and major pieces.
///
/// Weights: knight 1, bishop 1, rook 2, queen 4.
pub const MAX_PHASE: i32 = 24;

/// Phase in `0..=MAX_PHASE`; 0 is a bare king-and-pawn ending.
///
/// Clamped so promoted pieces cannot push it past the maximum.
pub fn game_phase(board: &Board) -> i32 {
    let count = |piece: Piece| board.pieces(piece).popcnt() as i32;
    let phase = count(Piece::Knight)
        + count(Piece::Bishop)
        + 2 * count(Piece::Rook)
        + 4 * count(Piece::Queen);
    phase.min(MAX_PHASE)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn starting_position_is_max_phase() {
        assert_eq!(game_phase(&Board::default()), MAX_PHASE);
    }

    #[test]
    fn pawn_ending_is_zero() {
        let board = Board::from_str("8/5k2/3p4/8/2P5/8/1K6/8 w - - 0 1").unwrap();
        assert_eq!(game_phase(&board), 0);
    }

    #[test]
    fn extra_queens_are_clamped() {
        let board = Board::from_str("4k3/8/8/8/8/8/QQQQQQQQ/4K3 b - - 0 1").unwrap();
        assert_eq!(game_phase(&board), MAX_PHASE);
    }
}
