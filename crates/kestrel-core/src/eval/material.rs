//! Material balance with a bishop-pair bonus, from White's perspective.

use chess::{ALL_PIECES, Board, Color, Piece};

use super::Tapered;

/// Middlegame / endgame material, indexed by `Piece::to_index()`.
const MATERIAL: [Tapered; 6] = [
    Tapered::new(100, 120),
    Tapered::new(320, 310),
    Tapered::new(330, 320),
    Tapered::new(500, 520),
    Tapered::new(900, 950),
    Tapered::new(0, 0),
];

const BISHOP_PAIR: Tapered = Tapered::new(40, 55);

/// Middlegame material value of a piece type in centipawns.
pub fn material_value(piece: Piece) -> i32 {
    MATERIAL[piece.to_index()].mg
}

pub(super) fn material(board: &Board) -> Tapered {
    let white = *board.color_combined(Color::White);
    let black = *board.color_combined(Color::Black);
    let mut score = Tapered::ZERO;

    for piece in ALL_PIECES {
        let bb = *board.pieces(piece);
        let diff = (bb & white).popcnt() as i32 - (bb & black).popcnt() as i32;
        let value = MATERIAL[piece.to_index()];
        score += Tapered::new(value.mg * diff, value.eg * diff);
    }

    let bishops = *board.pieces(Piece::Bishop);
    if (bishops & white).popcnt() >= 2 {
        score += BISHOP_PAIR;
    }
    if (bishops & black).popcnt() >= 2 {
        score -= BISHOP_PAIR;
    }
    score
}
