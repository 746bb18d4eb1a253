//! Piece-square terms.
//!
//! Tables are built at compile time from a few positional rules instead of
//! being written out square by square. Indices follow `Square::to_index()`
//! (a1 = 0, h8 = 63) from White's side; Black looks up the vertically
//! mirrored square.

use chess::{Color, Piece, Square};

use super::Tapered;

const fn file_of(sq: usize) -> i32 {
    (sq % 8) as i32
}

const fn rank_of(sq: usize) -> i32 {
    (sq / 8) as i32
}

/// Manhattan distance to the four centre squares, 0..=6.
const fn centre_distance(sq: usize) -> i32 {
    let f = file_of(sq);
    let r = rank_of(sq);
    let df = if f < 4 { 3 - f } else { f - 4 };
    let dr = if r < 4 { 3 - r } else { r - 4 };
    df + dr
}

const fn pawn_table() -> [Tapered; 64] {
    let mut t = [Tapered::ZERO; 64];
    let mut sq = 8;
    while sq < 56 {
        let r = rank_of(sq);
        let f = file_of(sq);
        let central = f == 3 || f == 4;
        let mut mg = (r - 1) * 6;
        if central && (r == 3 || r == 4) {
            mg += 15;
        }
        if central && r == 1 {
            mg -= 10;
        }
        t[sq] = Tapered::new(mg, (r - 1) * 14);
        sq += 1;
    }
    t
}

const fn centralising_table(mg_step: i32, eg_step: i32) -> [Tapered; 64] {
    let mut t = [Tapered::ZERO; 64];
    let mut sq = 0;
    while sq < 64 {
        let c = 3 - centre_distance(sq);
        t[sq] = Tapered::new(c * mg_step, c * eg_step);
        sq += 1;
    }
    t
}

const fn rook_table() -> [Tapered; 64] {
    let mut t = [Tapered::ZERO; 64];
    let mut sq = 0;
    while sq < 64 {
        let f = file_of(sq);
        let mut mg = if f == 3 || f == 4 { 5 } else { 0 };
        let mut eg = 0;
        if rank_of(sq) == 6 {
            mg += 20;
            eg += 10;
        }
        t[sq] = Tapered::new(mg, eg);
        sq += 1;
    }
    t
}

const fn king_table() -> [Tapered; 64] {
    let mut t = [Tapered::ZERO; 64];
    let mut sq = 0;
    while sq < 64 {
        let r = rank_of(sq);
        let f = file_of(sq);
        let shelter = if r == 0 && (f <= 2 || f >= 6) { 20 } else { 0 };
        let mg = shelter - 15 * r;
        let eg = (3 - centre_distance(sq)) * 10;
        t[sq] = Tapered::new(mg, eg);
        sq += 1;
    }
    t
}

const PAWN: [Tapered; 64] = pawn_table();
const KNIGHT: [Tapered; 64] = centralising_table(10, 8);
const BISHOP: [Tapered; 64] = centralising_table(5, 4);
const ROOK: [Tapered; 64] = rook_table();
const QUEEN: [Tapered; 64] = centralising_table(2, 5);
const KING: [Tapered; 64] = king_table();

/// Piece-square bonus for a `color` piece standing on `sq`.
pub(super) fn pst_value(piece: Piece, color: Color, sq: Square) -> Tapered {
    let idx = match color {
        Color::White => sq.to_index(),
        Color::Black => sq.to_index() ^ 56,
    };
    let table = match piece {
        Piece::Pawn => &PAWN,
        Piece::Knight => &KNIGHT,
        Piece::Bishop => &BISHOP,
        Piece::Rook => &ROOK,
        Piece::Queen => &QUEEN,
        Piece::King => &KING,
    };
    table[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn knights_prefer_the_centre() {
        let corner = pst_value(Piece::Knight, Color::White, Square::A1);
        let centre = pst_value(Piece::Knight, Color::White, Square::E4);
        assert!(centre.mg > corner.mg);
        assert!(centre.eg > corner.eg);
    }

    #[test]
    fn black_lookup_is_mirrored() {
        for piece in chess::ALL_PIECES {
            assert_eq!(
                pst_value(piece, Color::White, Square::C2),
                pst_value(piece, Color::Black, Square::C7),
            );
        }
    }

    #[test]
    fn passed_rank_pawns_gain_in_endgame() {
        let second = pst_value(Piece::Pawn, Color::White, Square::B2);
        let seventh = pst_value(Piece::Pawn, Color::White, Square::B7);
        assert!(seventh.eg > second.eg);
    }
}
