//! Game position: a board plus the history the board alone does not carry.
//!
//! `chess::Board` knows pieces, castling rights, en passant and the Zobrist
//! key. The search also needs the halfmove clock and the keys of earlier
//! positions for draw detection, so [`Position`] layers those on top and
//! exposes make/unmake with an explicit undo token.

use std::fmt;
use std::str::FromStr;

use chess::{BitBoard, Board, Color, EMPTY, MoveGen, Piece, Square};
use tracing::debug;

use crate::eval;
use crate::fen::FenFields;
use crate::see;
use crate::{FenError, Move, MoveError, MoveList};

/// Halfmove clock value at which the fifty-move rule applies.
const FIFTY_MOVE_PLIES: u32 = 100;

const RANK_1: u64 = 0x0000_0000_0000_00FF;
const RANK_8: u64 = 0xFF00_0000_0000_0000;

/// State needed to take back a move made with [`Position::make`].
#[derive(Debug, Clone, Copy)]
#[must_use = "an Undo must be passed back to unmake"]
pub struct Undo {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
}

/// A chess position with repetition history.
#[derive(Clone)]
pub struct Position {
    board: Board,
    halfmove_clock: u32,
    fullmove_number: u32,
    /// Keys of every earlier position, oldest first.
    history: Vec<u64>,
}

impl Position {
    /// The standard starting position.
    pub fn startpos() -> Position {
        Position {
            board: Board::default(),
            halfmove_clock: 0,
            fullmove_number: 1,
            history: Vec::with_capacity(256),
        }
    }

    /// Parse a position from FEN. The halfmove and fullmove counters are optional.
    pub fn from_fen(fen: &str) -> Result<Position, FenError> {
        let fields = FenFields::parse(fen)?;
        let board = Board::from_str(&fields.board_part()).map_err(|err| {
            debug!(fen, ?err, "board rejected FEN");
            FenError::Rejected { fen: fen.to_string() }
        })?;
        Ok(Position {
            board,
            halfmove_clock: fields.halfmove_clock,
            fullmove_number: fields.fullmove_number,
            history: Vec::with_capacity(256),
        })
    }

    /// The colour-flipped twin of this position.
    pub fn mirrored(&self) -> Result<Position, FenError> {
        Position::from_fen(&crate::mirror_fen(&self.fen())?)
    }

    /// Current position as FEN.
    pub fn fen(&self) -> String {
        let board_fen = self.board.to_string();
        let mut fields: Vec<&str> = board_fen.split_whitespace().take(4).collect();
        let halfmove = self.halfmove_clock.to_string();
        let fullmove = self.fullmove_number.to_string();
        fields.push(&halfmove);
        fields.push(&fullmove);
        fields.join(" ")
    }

    #[inline]
    pub fn hash(&self) -> u64 {
        self.board.get_hash()
    }

    #[inline]
    pub fn side_to_move(&self) -> Color {
        self.board.side_to_move()
    }

    #[inline]
    pub fn halfmove_clock(&self) -> u32 {
        self.halfmove_clock
    }

    #[inline]
    pub fn fullmove_number(&self) -> u32 {
        self.fullmove_number
    }

    #[inline]
    pub fn is_in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    /// All legal moves.
    pub fn legal_moves(&self) -> MoveList {
        let mut list = MoveList::new();
        for mv in MoveGen::new_legal(&self.board) {
            list.push(mv.into());
        }
        list
    }

    /// Legal captures (en passant included) and promotions.
    pub fn captures(&self) -> MoveList {
        let mut movegen = MoveGen::new_legal(&self.board);
        let us = self.board.side_to_move();
        let mut targets = *self.board.color_combined(!us);
        targets |= BitBoard::new(if us == Color::White { RANK_8 } else { RANK_1 });
        if let Some(ep) = self.en_passant_target() {
            targets |= BitBoard::from_square(ep);
        }
        movegen.set_iterator_mask(targets);

        let mut list = MoveList::new();
        for cm in movegen {
            let mv = Move::from(cm);
            if mv.promotion().is_some() || self.is_capture(mv) {
                list.push(mv);
            }
        }
        list
    }

    /// Square a pawn would move to when capturing en passant.
    fn en_passant_target(&self) -> Option<Square> {
        // The board records the square of the pawn that just double-pushed.
        let pawn = self.board.en_passant()?;
        let idx = match self.board.side_to_move() {
            Color::White => pawn.to_index() + 8,
            Color::Black => pawn.to_index().checked_sub(8)?,
        };
        chess::ALL_SQUARES.get(idx).copied()
    }

    /// Full legality check, used to validate moves from hash or heuristic tables.
    pub fn is_legal(&self, mv: Move) -> bool {
        !mv.is_null() && self.board.legal(mv.to_chess())
    }

    pub fn moved_piece(&self, mv: Move) -> Option<Piece> {
        self.board.piece_on(mv.source())
    }

    /// Piece removed from the board by `mv`, if any.
    pub fn captured_piece(&self, mv: Move) -> Option<Piece> {
        if see::is_en_passant(&self.board, mv) {
            return Some(Piece::Pawn);
        }
        self.board.piece_on(mv.dest())
    }

    #[inline]
    pub fn is_capture(&self, mv: Move) -> bool {
        self.captured_piece(mv).is_some()
    }

    /// Neither a capture nor a promotion.
    #[inline]
    pub fn is_quiet(&self, mv: Move) -> bool {
        mv.promotion().is_none() && !self.is_capture(mv)
    }

    pub fn gives_check(&self, mv: Move) -> bool {
        *self.board.make_move_new(mv.to_chess()).checkers() != EMPTY
    }

    /// Static exchange evaluation of `mv` in centipawns.
    pub fn see(&self, mv: Move) -> i32 {
        see::see(&self.board, mv)
    }

    /// Whether the exchange started by `mv` nets at least `threshold`.
    pub fn see_ge(&self, mv: Move, threshold: i32) -> bool {
        self.see(mv) >= threshold
    }

    /// Static evaluation from the side to move's perspective.
    pub fn evaluate(&self) -> i32 {
        eval::evaluate(&self.board)
    }

    /// Game phase, 0 (pawn ending) to [`eval::MAX_PHASE`].
    pub fn phase(&self) -> i32 {
        eval::game_phase(&self.board)
    }

    /// Whether `color` owns anything besides pawns and its king.
    pub fn has_non_pawn_material(&self, color: Color) -> bool {
        let pawns_and_kings = *self.board.pieces(Piece::Pawn) | *self.board.pieces(Piece::King);
        *self.board.color_combined(color) & !pawns_and_kings != EMPTY
    }

    /// Play a legal move.
    pub fn make(&mut self, mv: Move) -> Undo {
        let undo = self.undo_token();
        let resets_clock = self.moved_piece(mv) == Some(Piece::Pawn) || self.is_capture(mv);

        self.history.push(self.board.get_hash());
        self.board = self.board.make_move_new(mv.to_chess());
        self.halfmove_clock = if resets_clock { 0 } else { self.halfmove_clock + 1 };
        if self.board.side_to_move() == Color::White {
            self.fullmove_number += 1;
        }
        undo
    }

    pub fn unmake(&mut self, undo: Undo) {
        self.restore(undo);
    }

    /// Pass the move. Returns `None` when the side to move is in check.
    ///
    /// The halfmove clock restarts, which also bounds repetition lookups
    /// so positions before the pass are not matched.
    pub fn make_null(&mut self) -> Option<Undo> {
        let next = self.board.null_move()?;
        let undo = self.undo_token();
        self.history.push(self.board.get_hash());
        self.board = next;
        self.halfmove_clock = 0;
        Some(undo)
    }

    pub fn unmake_null(&mut self, undo: Undo) {
        self.restore(undo);
    }

    fn undo_token(&self) -> Undo {
        Undo {
            board: self.board,
            halfmove_clock: self.halfmove_clock,
            fullmove_number: self.fullmove_number,
        }
    }

    fn restore(&mut self, undo: Undo) {
        self.board = undo.board;
        self.halfmove_clock = undo.halfmove_clock;
        self.fullmove_number = undo.fullmove_number;
        self.history.pop();
    }

    /// The current position occurred before since the last irreversible move.
    pub fn is_repetition(&self) -> bool {
        let key = self.hash();
        let window = (self.halfmove_clock as usize).min(self.history.len());
        self.history
            .iter()
            .rev()
            .take(window)
            .skip(1)
            .step_by(2)
            .any(|&h| h == key)
    }

    /// Fifty moves without a capture or pawn move, unless the last of them mated.
    pub fn is_fifty_move_draw(&self) -> bool {
        self.halfmove_clock >= FIFTY_MOVE_PLIES && !self.is_checkmate()
    }

    pub fn is_checkmate(&self) -> bool {
        self.is_in_check() && MoveGen::new_legal(&self.board).next().is_none()
    }

    /// No sequence of legal moves can produce mate: bare kings, or a single minor piece.
    pub fn is_insufficient_material(&self) -> bool {
        let b = &self.board;
        let heavy = *b.pieces(Piece::Pawn) | *b.pieces(Piece::Rook) | *b.pieces(Piece::Queen);
        if heavy != EMPTY {
            return false;
        }
        let minors = *b.pieces(Piece::Knight) | *b.pieces(Piece::Bishop);
        minors.popcnt() <= 1
    }

    /// Draw by repetition, fifty-move rule or insufficient material.
    pub fn is_draw(&self) -> bool {
        self.is_fifty_move_draw() || self.is_insufficient_material() || self.is_repetition()
    }

    /// Parse UCI move text (`e2e4`, `e7e8q`) against the legal moves here.
    pub fn parse_uci_move(&self, text: &str) -> Result<Move, MoveError> {
        if !(4..=5).contains(&text.len()) || !text.is_ascii() {
            return Err(MoveError::Malformed(text.to_string()));
        }
        self.legal_moves()
            .iter()
            .copied()
            .find(|mv| mv.to_uci() == text)
            .ok_or_else(|| MoveError::Illegal(text.to_string()))
    }

    /// Parse and play a UCI move, keeping it in the repetition history.
    pub fn play_uci(&mut self, text: &str) -> Result<(), MoveError> {
        let mv = self.parse_uci_move(text)?;
        let _ = self.make(mv);
        Ok(())
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::startpos()
    }
}

impl FromStr for Position {
    type Err = FenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Position::from_fen(s)
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Position")
            .field("fen", &self.fen())
            .field("history", &self.history.len())
            .finish()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fen())
    }
}
