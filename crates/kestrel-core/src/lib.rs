//! Board-side building blocks for the kestrel search: positions with game
//! history, packed moves, static exchange evaluation and static evaluation.

mod chess_move;
mod error;
pub mod eval;
mod fen;
mod move_list;
mod position;
mod see;

pub use chess::{Color, Piece, Square};
pub use chess_move::Move;
pub use error::{FenError, MoveError};
pub use eval::evaluate;
pub use fen::{STARTING_FEN, mirror_fen};
pub use move_list::{MAX_MOVES, MoveList};
pub use position::{Position, Undo};
pub use see::piece_value;
