//! Groups moves that alias each other for delayed-move ordering: when two or
//! more legal moves reach the same effective outcome (several pieces that
//! could drop on the same blocking square, or a slide that could promote or
//! not), trying every alias before the one actually worth searching wastes
//! nodes. Moves in the same group are linked so a search can walk past
//! earlier aliases to its preferred one.
//!
//! Grounded on `komori::DelayedMoveList`.

use crate::shogi::board::promotion_zone_check;
use crate::shogi::position::MateSearchPosition;
use crate::shogi::types::{Move, PieceType, Square};
use crate::types::color::Color;
use std::collections::HashMap;

pub struct DelayedMoveList {
    prev: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
}

impl DelayedMoveList {
    /// Builds the grouping for `moves`, all legal replies at a position
    /// where `is_or_node` is the mover's polarity.
    pub fn new<P: MateSearchPosition>(pos: &P, is_or_node: bool, moves: &[Move]) -> DelayedMoveList {
        let n = moves.len();
        let mut prev = vec![None; n];
        let mut next = vec![None; n];
        let mut last_in_group: HashMap<AliasKey, usize> = HashMap::new();

        for (i, &mv) in moves.iter().enumerate() {
            if !is_delayable(pos, is_or_node, mv) {
                continue;
            }
            let key = alias_key(mv);
            if let Some(&last) = last_in_group.get(&key) {
                next[last] = Some(i);
                prev[i] = Some(last);
            }
            last_in_group.insert(key, i);
        }

        DelayedMoveList { prev, next }
    }

    /// The earlier alias in `i`'s group, if any.
    pub fn prev(&self, i: usize) -> Option<usize> {
        self.prev[i]
    }

    /// The later alias in `i`'s group, if any.
    pub fn next(&self, i: usize) -> Option<usize> {
        self.next[i]
    }

    /// True when `i` has an earlier alias that should be tried first.
    pub fn is_delayed(&self, i: usize) -> bool {
        self.prev[i].is_some()
    }
}

#[derive(PartialEq, Eq, Hash)]
enum AliasKey {
    Drop(Square),
    Normal(Square, Square),
}

fn alias_key(mv: Move) -> AliasKey {
    match mv {
        Move::Drop { to, .. } => AliasKey::Drop(to),
        Move::Normal { from, to, .. } => AliasKey::Normal(from, to),
    }
}

/// Drops are only worth delaying at AND nodes, where several drop squares
/// can block the same check; the attacker (OR node) rarely has that
/// redundancy. Slides are delayable when promoting vs. not is a genuine
/// open choice: a Pawn/Bishop/Rook touching the promotion zone, or a Lance
/// landing on the rank just short of the board edge (its last reachable
/// non-promoting rank).
fn is_delayable<P: MateSearchPosition>(pos: &P, is_or_node: bool, mv: Move) -> bool {
    match mv {
        Move::Drop { .. } => !is_or_node,
        Move::Normal { from, to, .. } => {
            let Some(piece_type) = pos.piece_type_at(from) else {
                return false;
            };
            let color = pos.side_to_move();
            match piece_type {
                PieceType::Pawn | PieceType::Bishop | PieceType::Rook => {
                    promotion_zone_check(color, from) || promotion_zone_check(color, to)
                }
                PieceType::Lance => to.rank() == second_to_last_rank(color),
                _ => false,
            }
        }
    }
}

fn second_to_last_rank(color: Color) -> u8 {
    match color {
        Color::Black => 1,
        Color::White => 7,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::HandPiece;
    use crate::shogi::board::Board;
    use crate::shogi::types::Piece;

    #[test]
    fn test_two_drops_on_same_square_alias_at_and_node() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(4, 4));
        board.set_attacker_king(Square::new(0, 0));
        board.set_side_to_move(Color::Black);

        let moves = vec![
            Move::Drop { piece: HandPiece::Gold, to: Square::new(4, 3) },
            Move::Drop { piece: HandPiece::Silver, to: Square::new(4, 3) },
        ];
        let dml = DelayedMoveList::new(&board, false, &moves);
        assert!(!dml.is_delayed(0));
        assert!(dml.is_delayed(1));
        assert_eq!(dml.prev(1), Some(0));
        assert_eq!(dml.next(0), Some(1));
    }

    #[test]
    fn test_drops_do_not_alias_at_or_node() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(4, 4));
        board.set_attacker_king(Square::new(0, 0));
        board.set_side_to_move(Color::Black);

        let moves = vec![
            Move::Drop { piece: HandPiece::Gold, to: Square::new(4, 3) },
            Move::Drop { piece: HandPiece::Silver, to: Square::new(4, 3) },
        ];
        let dml = DelayedMoveList::new(&board, true, &moves);
        assert!(!dml.is_delayed(0));
        assert!(!dml.is_delayed(1));
    }

    #[test]
    fn test_pawn_promote_or_not_aliases_by_from_and_to() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(8, 8));
        board.set_attacker_king(Square::new(0, 0));
        board.place(Square::new(4, 3), Piece { color: Color::Black, piece_type: PieceType::Pawn });
        board.set_side_to_move(Color::Black);

        let from = Square::new(4, 3);
        let to = Square::new(4, 2);
        let moves = vec![
            Move::Normal { from, to, promote: false },
            Move::Normal { from, to, promote: true },
        ];
        let dml = DelayedMoveList::new(&board, true, &moves);
        assert!(dml.is_delayed(1));
        assert_eq!(dml.prev(1), Some(0));
    }

    #[test]
    fn test_lance_not_on_second_to_last_rank_is_not_delayable() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(8, 8));
        board.set_attacker_king(Square::new(0, 0));
        board.place(Square::new(4, 4), Piece { color: Color::Black, piece_type: PieceType::Lance });
        board.set_side_to_move(Color::Black);

        let from = Square::new(4, 4);
        let to = Square::new(4, 3);
        let moves = vec![
            Move::Normal { from, to, promote: false },
            Move::Normal { from, to, promote: true },
        ];
        let dml = DelayedMoveList::new(&board, true, &moves);
        assert!(!dml.is_delayed(0));
        assert!(!dml.is_delayed(1));
    }

    #[test]
    fn test_unrelated_moves_are_not_linked() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(8, 8));
        board.set_attacker_king(Square::new(0, 0));
        board.set_side_to_move(Color::Black);

        let moves = vec![
            Move::Drop { piece: HandPiece::Gold, to: Square::new(4, 3) },
            Move::Drop { piece: HandPiece::Silver, to: Square::new(5, 3) },
        ];
        let dml = DelayedMoveList::new(&board, false, &moves);
        assert!(!dml.is_delayed(0));
        assert!(!dml.is_delayed(1));
    }
}
