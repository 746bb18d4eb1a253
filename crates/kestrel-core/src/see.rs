//! Static exchange evaluation.
//!
//! Plays out the capture sequence on one square with both sides always
//! recapturing with their least valuable attacker, and either side free to
//! stop when continuing would lose material.

use chess::{
    ALL_PIECES, BitBoard, Board, Color, EMPTY, Piece, Square, get_bishop_moves, get_king_moves,
    get_knight_moves, get_pawn_attacks, get_rook_moves,
};

use crate::Move;

/// Exchange values indexed by `Piece::to_index()`.
const SEE_VALUE: [i32; 6] = [100, 320, 330, 500, 900, 20_000];

/// Exchange value of a piece type, also used for capture ordering.
#[inline]
pub fn piece_value(piece: Piece) -> i32 {
    SEE_VALUE[piece.to_index()]
}

fn diagonal_sliders(board: &Board) -> BitBoard {
    *board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen)
}

fn straight_sliders(board: &Board) -> BitBoard {
    *board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)
}

/// Every piece of either colour attacking `sq` given occupancy `occ`.
fn attackers_to(board: &Board, sq: Square, occ: BitBoard) -> BitBoard {
    let pawns = *board.pieces(Piece::Pawn);
    let white_pawns = get_pawn_attacks(sq, Color::Black, pawns & *board.color_combined(Color::White));
    let black_pawns = get_pawn_attacks(sq, Color::White, pawns & *board.color_combined(Color::Black));

    (get_knight_moves(sq) & *board.pieces(Piece::Knight))
        | (get_king_moves(sq) & *board.pieces(Piece::King))
        | (get_bishop_moves(sq, occ) & diagonal_sliders(board))
        | (get_rook_moves(sq, occ) & straight_sliders(board))
        | white_pawns
        | black_pawns
}

fn least_valuable(board: &Board, attackers: BitBoard) -> Option<(Square, Piece)> {
    ALL_PIECES.iter().find_map(|&piece| {
        let candidates = attackers & *board.pieces(piece);
        (candidates != EMPTY).then(|| (candidates.to_square(), piece))
    })
}

/// Whether `mv` captures a pawn en passant on `board`.
pub(crate) fn is_en_passant(board: &Board, mv: Move) -> bool {
    board.piece_on(mv.source()) == Some(Piece::Pawn)
        && mv.source().get_file() != mv.dest().get_file()
        && board.piece_on(mv.dest()).is_none()
}

/// Material balance of the exchange started by `mv`, from the mover's side.
pub fn see(board: &Board, mv: Move) -> i32 {
    let from = mv.source();
    let to = mv.dest();
    let en_passant = is_en_passant(board, mv);

    let mut gain = [0i32; 32];
    gain[0] = if en_passant {
        SEE_VALUE[Piece::Pawn.to_index()]
    } else {
        board.piece_on(to).map_or(0, piece_value)
    };

    let mover = board.piece_on(from).unwrap_or(Piece::Pawn);
    let mut on_square = mv.promotion().map_or(piece_value(mover), piece_value);

    let mut occ = *board.combined() & !BitBoard::from_square(from);
    if en_passant {
        // The captured pawn sits behind the destination square.
        let behind = match board.side_to_move() {
            Color::White => to.to_index() - 8,
            Color::Black => to.to_index() + 8,
        };
        occ &= !BitBoard::new(1u64 << behind);
    }

    let mut attackers = attackers_to(board, to, occ) & occ;
    let mut side = !board.side_to_move();
    let mut depth = 0;

    while let Some((sq, piece)) = least_valuable(board, attackers & *board.color_combined(side)) {
        if depth + 1 >= gain.len() {
            break;
        }
        depth += 1;
        gain[depth] = on_square - gain[depth - 1];
        on_square = piece_value(piece);

        occ &= !BitBoard::from_square(sq);
        if matches!(piece, Piece::Pawn | Piece::Bishop | Piece::Queen) {
            attackers |= get_bishop_moves(to, occ) & diagonal_sliders(board);
        }
        if matches!(piece, Piece::Rook | Piece::Queen) {
            attackers |= get_rook_moves(to, occ) & straight_sliders(board);
        }
        attackers &= occ;
        side = !side;
    }

    while depth > 0 {
        depth -= 1;
        gain[depth] = -(-gain[depth]).max(gain[depth + 1]);
    }
    gain[0]
}
