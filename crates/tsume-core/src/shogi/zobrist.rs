//! Seeded Zobrist table for [`super::board::Board`]'s board key.
//!
//! Table values come from a fixed-seed PRNG rather than per-run randomness:
//! `tt` save/load round-trips a board key across process restarts, so the
//! same position must hash identically every time the table is built.

use std::sync::OnceLock;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::shogi::types::{PieceType, Square};
use crate::types::color::Color;

/// Arbitrary fixed seed. Changing this invalidates any previously saved TT.
const ZOBRIST_SEED: u64 = 0x5153_554d_455f_5a30;

/// Hand counts run 0..=18 (a full set of pawns); see `hand::HandPiece::max_count`.
const MAX_HAND_COUNT: usize = 18;

struct ZobristTable {
    piece_square: [[[u64; Square::NUM]; PieceType::NUM]; Color::NUM],
    hand: [[u64; MAX_HAND_COUNT + 1]; Color::NUM],
    side_to_move: u64,
}

impl ZobristTable {
    fn new() -> ZobristTable {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(ZOBRIST_SEED);
        let mut piece_square = [[[0u64; Square::NUM]; PieceType::NUM]; Color::NUM];
        for color in &mut piece_square {
            for piece_type in color.iter_mut() {
                for slot in piece_type.iter_mut() {
                    *slot = rng.random();
                }
            }
        }
        let mut hand = [[0u64; MAX_HAND_COUNT + 1]; Color::NUM];
        for color in &mut hand {
            // count == 0 always hashes to 0 so an empty hand contributes nothing.
            for count in color.iter_mut().skip(1) {
                *count = rng.random();
            }
        }
        ZobristTable {
            piece_square,
            hand,
            side_to_move: rng.random(),
        }
    }

    fn piece_square_hash(&self, color: Color, piece_type: PieceType, sq: Square) -> u64 {
        self.piece_square[color.index()][piece_type.index()][sq.index()]
    }

    fn hand_hash(&self, color: Color, count: u8) -> u64 {
        self.hand[color.index()][(count as usize).min(MAX_HAND_COUNT)]
    }

    fn side_hash(&self, side_to_move: Color) -> u64 {
        match side_to_move {
            Color::Black => 0,
            Color::White => self.side_to_move,
        }
    }
}

static ZOBRIST: OnceLock<ZobristTable> = OnceLock::new();

fn table() -> &'static ZobristTable {
    ZOBRIST.get_or_init(ZobristTable::new)
}

pub fn piece_hash(color: Color, piece_type: PieceType, sq: Square) -> u64 {
    table().piece_square_hash(color, piece_type, sq)
}

pub fn hand_hash(color: Color, count: u8) -> u64 {
    table().hand_hash(color, count)
}

pub fn side_to_move_hash(side_to_move: Color) -> u64 {
    table().side_hash(side_to_move)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_gives_same_table_across_calls() {
        let a = piece_hash(Color::Black, PieceType::Rook, Square::new(4, 4));
        let b = piece_hash(Color::Black, PieceType::Rook, Square::new(4, 4));
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_squares_hash_differently() {
        let a = piece_hash(Color::Black, PieceType::Pawn, Square::new(0, 0));
        let b = piece_hash(Color::Black, PieceType::Pawn, Square::new(1, 0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_zero_hand_count_contributes_nothing() {
        assert_eq!(hand_hash(Color::Black, 0), 0);
        assert_eq!(hand_hash(Color::White, 0), 0);
    }

    #[test]
    fn test_black_to_move_contributes_nothing() {
        assert_eq!(side_to_move_hash(Color::Black), 0);
        assert_ne!(side_to_move_hash(Color::White), 0);
    }

    #[test]
    fn test_hand_count_above_cap_saturates_to_max() {
        assert_eq!(hand_hash(Color::Black, 18), hand_hash(Color::Black, 200));
    }
}
