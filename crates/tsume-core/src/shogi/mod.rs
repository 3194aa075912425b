//! Shogi board types and the trait-level contract the search core needs
//! from a position, plus one minimal concrete backend ([`board::Board`]).

pub mod board;
pub mod movegen;
pub mod position;
pub mod types;
pub mod zobrist;

pub use position::{mate_1ply, MateSearchPosition, MoveGenerator};
