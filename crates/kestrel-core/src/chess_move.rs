//! Compact 16-bit move encoding.
//!
//! ```text
//! bits  0-5   source square (0 = a1 .. 63 = h8)
//! bits  6-11  destination square
//! bits 12-14  promotion piece (0 none, 1 knight, 2 bishop, 3 rook, 4 queen)
//! ```
//!
//! The all-zero word (a1a1) is never a legal move and serves as [`Move::NULL`].
//! The packed form fits the transposition table data word and the killer and
//! counter-move tables without conversion.

use std::fmt;

use chess::{ALL_SQUARES, ChessMove, Piece, Square};

const SQUARE_MASK: u16 = 0x3F;
const DEST_SHIFT: u16 = 6;
const PROMO_SHIFT: u16 = 12;

/// A chess move packed into 16 bits.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Move(u16);

impl Move {
    /// The null move: "no move".
    pub const NULL: Move = Move(0);

    /// A plain move from `source` to `dest`.
    pub fn new(source: Square, dest: Square) -> Move {
        Move(source.to_index() as u16 | (dest.to_index() as u16) << DEST_SHIFT)
    }

    /// A pawn move to the last rank promoting to `piece`.
    pub fn with_promotion(source: Square, dest: Square, piece: Piece) -> Move {
        let code = match piece {
            Piece::Knight => 1,
            Piece::Bishop => 2,
            Piece::Rook => 3,
            _ => 4,
        };
        Move(Self::new(source, dest).0 | code << PROMO_SHIFT)
    }

    /// The packed representation.
    #[inline]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Rebuild a move from [`Move::raw`].
    #[inline]
    pub const fn from_raw(raw: u16) -> Move {
        Move(raw)
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn source(self) -> Square {
        ALL_SQUARES[(self.0 & SQUARE_MASK) as usize]
    }

    #[inline]
    pub fn dest(self) -> Square {
        ALL_SQUARES[((self.0 >> DEST_SHIFT) & SQUARE_MASK) as usize]
    }

    /// The piece a pawn promotes to, if this is a promotion.
    pub fn promotion(self) -> Option<Piece> {
        match (self.0 >> PROMO_SHIFT) & 0x7 {
            1 => Some(Piece::Knight),
            2 => Some(Piece::Bishop),
            3 => Some(Piece::Rook),
            4 => Some(Piece::Queen),
            _ => None,
        }
    }

    /// Long algebraic (UCI) notation, e.g. `e2e4` or `e7e8q`. The null move prints as `0000`.
    pub fn to_uci(self) -> String {
        self.to_string()
    }

    pub(crate) fn to_chess(self) -> ChessMove {
        ChessMove::new(self.source(), self.dest(), self.promotion())
    }
}

impl From<ChessMove> for Move {
    fn from(mv: ChessMove) -> Self {
        match mv.get_promotion() {
            Some(piece) => Move::with_promotion(mv.get_source(), mv.get_dest(), piece),
            None => Move::new(mv.get_source(), mv.get_dest()),
        }
    }
}

fn write_square(f: &mut fmt::Formatter<'_>, sq: Square) -> fmt::Result {
    let file = (b'a' + sq.get_file().to_index() as u8) as char;
    let rank = (b'1' + sq.get_rank().to_index() as u8) as char;
    write!(f, "{file}{rank}")
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("0000");
        }
        write_square(f, self.source())?;
        write_square(f, self.dest())?;
        match self.promotion() {
            Some(Piece::Knight) => f.write_str("n"),
            Some(Piece::Bishop) => f.write_str("b"),
            Some(Piece::Rook) => f.write_str("r"),
            Some(_) => f.write_str("q"),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({self})")
    }
}
