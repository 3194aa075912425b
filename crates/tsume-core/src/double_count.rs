//! Double-count elimination: df-pn can overcount a descendant's pn/dn
//! contribution when two different paths from the root converge on the same
//! descendant, since naive backpropagation adds that descendant's numbers
//! into both parents' sums as if they were independent. This walks the
//! transposition table's parent pointers backwards from a candidate move to
//! see whether it reconverges with an ancestor already on the current
//! search path, and if so, where the branch that caused the merge starts.
//!
//! Grounded on `komori::FindKnownAncestor` / `BranchRootEdge`.

use crate::hand::Hand;
use crate::node::Node;
use crate::pndn::{ANCESTOR_SEARCH_THRESHOLD, INFINITE_PN_DN};
use crate::shogi::position::MateSearchPosition;
use crate::shogi::types::Move;
use crate::tt::TranspositionTable;

/// An edge identified as the root of a branch that reconverges with the
/// current search path: `branch_root` is the node both paths pass through,
/// `child` is the step away from it that the table's parent chain took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchRootEdge {
    pub branch_root_board_key: u64,
    pub branch_root_hand: Hand,
    pub child_board_key: u64,
    pub child_hand: Hand,
    pub branch_root_is_or_node: bool,
}

/// Walks the transposition table's parent pointers starting from `n` after
/// `mv`, looking for a reconvergence with a node already on `n`'s current
/// search path. Bounded to `n.depth()` steps so a corrupted or cyclic parent
/// chain can't loop forever.
pub fn find_known_ancestor<P: MateSearchPosition>(
    tt: &TranspositionTable,
    n: &Node<'_, P>,
    mv: Move,
) -> Option<BranchRootEdge> {
    let (mut board_key, mut hand) = n.board_key_hand_pair_after(mv);
    let mut last_pn = INFINITE_PN_DN;
    let mut last_dn = INFINITE_PN_DN;

    let mut pn_flag = true;
    let mut dn_flag = true;
    let mut or_node = n.is_or_node();

    for i in 0..n.depth() {
        if !pn_flag && !dn_flag {
            break;
        }

        let Some((parent, pn, dn)) = tt.look_up_parent_pn_dn_by_key(board_key, hand) else {
            break;
        };
        let (parent_board_key, parent_hand) = parent;

        if i == 0 && (parent_board_key, parent_hand) == n.board_key_hand_pair() {
            break;
        }

        if n.contains_in_path(parent_board_key, parent_hand).is_some() {
            if (or_node && dn_flag) || (!or_node && pn_flag) {
                return Some(BranchRootEdge {
                    branch_root_board_key: parent_board_key,
                    branch_root_hand: parent_hand,
                    child_board_key: board_key,
                    child_hand: hand,
                    branch_root_is_or_node: or_node,
                });
            } else {
                break;
            }
        }

        if dn <= ANCESTOR_SEARCH_THRESHOLD || (!or_node && dn > last_dn + ANCESTOR_SEARCH_THRESHOLD) {
            dn_flag = false;
        }
        if pn <= ANCESTOR_SEARCH_THRESHOLD || (or_node && pn > last_pn + ANCESTOR_SEARCH_THRESHOLD) {
            pn_flag = false;
        }

        board_key = parent_board_key;
        hand = parent_hand;
        last_pn = pn;
        last_dn = dn;
        or_node = !or_node;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::HandPiece;
    use crate::shogi::board::Board;
    use crate::shogi::types::Square;
    use crate::types::color::Color;

    fn lance_mate_board() -> Board {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(0, 8));
        board.set_attacker_king(Square::new(2, 7));
        board.give_hand(Color::White, HandPiece::Lance, 1);
        board.set_side_to_move(Color::White);
        board
    }

    #[test]
    fn test_no_ancestor_found_with_empty_table() {
        let tt = TranspositionTable::new(1);
        let mut board = lance_mate_board();
        let node = Node::new(&mut board, true, 0, 3);
        let mv = Move::Drop {
            piece: HandPiece::Lance,
            to: Square::new(0, 0),
        };
        assert!(find_known_ancestor(&tt, &node, mv).is_none());
    }

    #[test]
    fn test_depth_zero_never_searches() {
        let tt = TranspositionTable::new(1);
        let mut board = lance_mate_board();
        let node = Node::new(&mut board, true, 0, 0);
        let mv = Move::Drop {
            piece: HandPiece::Lance,
            to: Square::new(0, 0),
        };
        assert!(find_known_ancestor(&tt, &node, mv).is_none());
    }

    #[test]
    fn test_reconvergence_with_path_ancestor_is_detected() {
        let tt = TranspositionTable::new(1);
        let mut board = lance_mate_board();
        let mut node = Node::new(&mut board, true, 0, 0);
        let root_key_hand = node.board_key_hand_pair();

        let mv1 = Move::Drop {
            piece: HandPiece::Lance,
            to: Square::new(0, 0),
        };
        node.do_move(mv1);

        // Structurally legal under `Board::do_move` even though this isn't a
        // legal shogi reply (the king is in check here) — this exercises the
        // table-walk bookkeeping, not move legality, which is the move
        // generator's job.
        let mv2 = Move::Normal {
            from: Square::new(0, 8),
            to: Square::new(1, 8),
            promote: false,
        };
        node.do_move(mv2);

        let mv3 = Move::Normal {
            from: Square::new(2, 7),
            to: Square::new(2, 6),
            promote: false,
        };
        let child_key_hand = node.board_key_hand_pair_after(mv3);

        // Simulate a transposition: some other path already reached the
        // position after `mv3` and recorded `root_key_hand` as its parent,
        // even though on *this* path it's three plies deeper.
        tt.build_query(child_key_hand.0, child_key_hand.1, 0, node.depth())
            .set_parent(root_key_hand.0, root_key_hand.1);

        let edge = find_known_ancestor(&tt, &node, mv3).expect("root is on the current path, so this must resolve");
        assert_eq!(edge.branch_root_board_key, root_key_hand.0);
        assert_eq!(edge.branch_root_hand, root_key_hand.1);
        assert_eq!(edge.child_board_key, child_key_hand.0);
        assert_eq!(edge.child_hand, child_key_hand.1);
        assert!(edge.branch_root_is_or_node);
    }
}
