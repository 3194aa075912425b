//! Per-node cache of child results: the thing the recursive search actually
//! reads and writes at every step of the descent.
//!
//! A [`LocalExpansion`] is built once per visited node from the current
//! position's legal moves, holds each child's [`SearchResult`] plus a TT
//! [`Query`] to write it back through, and keeps those children sorted
//! best-first so the search always recurses into the most promising one.
//!
//! Grounded on `komori::LocalExpansion`.

use crate::bitset::BitSet64;
use crate::expansion::delayed::DelayedMoveList;
use crate::hand::{DisproofHandTag, Hand, HandPiece, HandSet, ProofHandTag};
use crate::mate_len::MateLen;
use crate::node::Node;
use crate::pndn::{delta, phi, saturating_add, PnDn, INFINITE_PN_DN, PN_DN_UNIT};
use crate::search_result::{compare_results, Ordering3, SearchResult, UnknownData};
use crate::shogi::position::{MateSearchPosition, MoveGenerator};
use crate::shogi::types::Move;
use crate::tt::{Query, TranspositionTable};
use std::cmp::Ordering;

pub struct LocalExpansion<'a> {
    moves: Vec<Move>,
    child_keys: Vec<(u64, Hand)>,
    captured: Vec<Option<HandPiece>>,
    results: Vec<SearchResult>,
    queries: Vec<Query<'a>>,
    idx: Vec<usize>,
    excluded_moves: usize,
    delayed: DelayedMoveList,
    sum_mask: BitSet64,
    does_have_old_child: bool,
    num_drop_moves: u32,
    num_nondrop_moves: u32,
    multi_pv: u32,
    or_node: bool,
}

impl<'a> LocalExpansion<'a> {
    pub fn new<P, M>(tt: &'a TranspositionTable, node: &mut Node<'_, P>, movegen: &M, len: MateLen, multi_pv: u32) -> LocalExpansion<'a>
    where
        P: MateSearchPosition,
        M: MoveGenerator<P>,
    {
        let or_node = node.is_or_node();
        let mut moves = movegen.generate_moves(node.pos());
        if or_node {
            // At an OR node the mover isn't necessarily in check, so legal
            // moves include non-checks; only checking moves are worth
            // searching toward mate.
            moves.retain(|&mv| movegen.is_check_move(node.pos(), mv));
        }
        let delayed = DelayedMoveList::new(node.pos(), or_node, &moves);

        let mut child_keys = Vec::with_capacity(moves.len());
        let mut captured = Vec::with_capacity(moves.len());
        let mut results = Vec::with_capacity(moves.len());
        let mut queries = Vec::with_capacity(moves.len());
        let mut num_drop_moves = 0u32;
        let mut num_nondrop_moves = 0u32;
        let mut sum_mask = BitSet64::NONE;

        for (i, &mv) in moves.iter().enumerate() {
            let is_drop = matches!(mv, Move::Drop { .. });
            if is_drop {
                num_drop_moves += 1;
            } else {
                num_nondrop_moves += 1;
            }
            if is_drop && i < 64 {
                sum_mask.set(i);
            }

            captured.push(match mv {
                Move::Normal { to, .. } => node.pos().piece_type_at(to).and_then(|pt| pt.demoted()),
                Move::Drop { .. } => None,
            });

            let (board_key, hand) = node.board_key_hand_pair_after(mv);
            child_keys.push((board_key, hand));

            let path_key = node.path_key_after(mv);
            let query = tt.build_query(board_key, hand, path_key, node.depth() + 1);
            let looked_up = query.look_up(len);

            let result = match looked_up {
                Some(r) if r.repetition_start_depth.is_some() => {
                    SearchResult::repetition(hand, r.len, 1, r.repetition_start_depth.unwrap())
                }
                Some(r) if r.pn == 0 => SearchResult::proven(hand, r.len, 1),
                Some(r) if r.dn == 0 => SearchResult::disproven(hand, r.len, 1),
                Some(r) => SearchResult::unknown(
                    r.pn,
                    r.dn,
                    hand,
                    r.len,
                    1,
                    UnknownData {
                        is_first_visit: false,
                        parent_board_key: node.board_key(),
                        parent_hand: node.or_hand(),
                        sum_mask: BitSet64::NONE,
                    },
                ),
                None => fresh_child_result(node, movegen, mv, hand, len),
            };

            results.push(result);
            queries.push(query);
        }

        let does_have_old_child = results.iter().any(|r| matches!(r, SearchResult::Unknown { data, .. } if !data.is_first_visit));

        let mut idx: Vec<usize> = (0..moves.len()).filter(|&i| delayed.prev(i).is_none()).collect();
        idx.sort_by(|&a, &b| ordering3_to_std(compare_results(&results[a], &results[b], or_node)));

        LocalExpansion {
            moves,
            child_keys,
            captured,
            results,
            queries,
            idx,
            excluded_moves: 0,
            delayed,
            sum_mask,
            does_have_old_child,
            num_drop_moves,
            num_nondrop_moves,
            multi_pv: multi_pv.max(1),
            or_node,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn does_have_old_child(&self) -> bool {
        self.does_have_old_child
    }

    /// The move the search should recurse into next.
    pub fn front_move(&self) -> Option<Move> {
        self.idx.get(self.excluded_moves).map(|&i| self.moves[i])
    }

    pub fn front_query(&self) -> Option<&Query<'a>> {
        self.idx.get(self.excluded_moves).map(|&i| &self.queries[i])
    }

    pub fn find_move_index(&self, board_key: u64, hand: Hand) -> Option<usize> {
        self.child_keys.iter().position(|&k| k == (board_key, hand))
    }

    /// Reverts the implicated child's δ contribution from sum to max, used
    /// when double-count elimination finds this expansion sits between a
    /// reconverging child and the ancestor it reconverges with.
    pub fn clear_sum_mask(&mut self, move_index: usize) {
        self.sum_mask.reset(move_index);
    }

    /// The thresholds to search the front child with, derived from this
    /// node's own `(thpn, thdn)`.
    pub fn front_pn_dn_thresholds(&self, thpn: PnDn, thdn: PnDn) -> (PnDn, PnDn) {
        let thphi = phi(thpn, thdn, self.or_node);
        let thdelta = delta(thpn, thdn, self.or_node);

        let active = &self.idx[self.excluded_moves..];
        let second_phi = active
            .get(1)
            .map(|&j| self.results[j].phi(self.or_node))
            .unwrap_or(INFINITE_PN_DN);
        let child_thphi = thphi.min(saturating_add(second_phi, 1));

        let penalty = delta_penalty(self.num_drop_moves, self.num_nondrop_moves);
        let child_thdelta = thdelta.saturating_sub(penalty);

        if self.or_node {
            (child_thphi, child_thdelta)
        } else {
            (child_thdelta, child_thphi)
        }
    }

    /// Records the result of having recursed into the current front move,
    /// re-sorts the active children, and admits the next delayed alias if
    /// the front move just resolved as a dead end for the mover.
    pub fn update_best_child(&mut self, result: SearchResult) {
        let i = self.idx[self.excluded_moves];
        self.results[i] = result;
        self.queries[i].update(result.pn(), result.dn(), result.len(), result.amount());

        if result.is_final() && result.delta(self.or_node) == 0 {
            if let Some(next) = self.delayed.next(i) {
                self.idx.push(next);
            }
        }

        self.idx[self.excluded_moves..].sort_by(|&a, &b| ordering3_to_std(compare_results(&self.results[a], &self.results[b], self.or_node)));

        if result.is_final()
            && result.phi(self.or_node) == 0
            && self.multi_pv > 1
            && (self.excluded_moves as u32) + 1 < self.multi_pv
            && self.excluded_moves + 1 < self.idx.len()
        {
            self.excluded_moves += 1;
        }
    }

    /// This node's own result, derived from the current front child (and,
    /// when every child participates in a disproof/proof, from all of
    /// them).
    pub fn current_result<P: MateSearchPosition>(&self, node: &Node<'_, P>) -> SearchResult {
        if self.moves.is_empty() {
            return self.obvious_result(node);
        }

        let best_i = self.idx[self.excluded_moves];
        let best = self.results[best_i];
        let phi_val = best.phi(self.or_node);
        if phi_val == 0 {
            return self.resolved_by_best(node, best_i, best);
        }

        let delta_val = self.aggregate_delta();
        if delta_val == 0 {
            return self.resolved_by_all(node);
        }

        let pn = if self.or_node { phi_val } else { delta_val };
        let dn = if self.or_node { delta_val } else { phi_val };
        SearchResult::unknown(
            pn.max(1),
            dn.max(1),
            node.or_hand(),
            MateLen::ZERO,
            self.moves.len() as u32,
            UnknownData {
                is_first_visit: false,
                parent_board_key: node.board_key(),
                parent_hand: node.or_hand(),
                sum_mask: self.sum_mask,
            },
        )
    }

    fn obvious_result<P: MateSearchPosition>(&self, node: &Node<'_, P>) -> SearchResult {
        if self.or_node {
            SearchResult::disproven(node.or_hand(), MateLen::ZERO, 1)
        } else {
            SearchResult::proven(node.or_hand(), MateLen::ZERO, 1)
        }
    }

    fn resolved_by_best<P: MateSearchPosition>(&self, node: &Node<'_, P>, best_i: usize, best: SearchResult) -> SearchResult {
        let mv = self.moves[best_i];
        let hand = proof_hand_before_move(self.or_node, mv, self.captured[best_i], best.hand());
        let len = best.len().succ();
        let amount = best.amount().saturating_add(1);

        if let Some(start) = best.repetition_start_depth() {
            if start < node.depth() {
                return SearchResult::repetition(hand, len, amount, start);
            }
        }

        if self.or_node {
            SearchResult::proven(hand, len, amount)
        } else {
            SearchResult::disproven(hand, len, amount)
        }
    }

    fn resolved_by_all<P: MateSearchPosition>(&self, node: &Node<'_, P>) -> SearchResult {
        let mut set = if self.or_node {
            HandSet::new_proof(ProofHandTag)
        } else {
            HandSet::new_disproof(DisproofHandTag)
        };
        let mut max_len = MateLen::MINUS_ONE;
        let mut amount = 0u32;
        for &i in &self.idx[self.excluded_moves..] {
            let r = self.results[i];
            set.update(r.hand());
            max_len = max_len.max(r.len());
            amount = amount.saturating_add(r.amount());
        }
        let hand = set.get(node.or_hand());
        let len = max_len.succ();

        if self.or_node {
            SearchResult::disproven(hand, len, amount)
        } else {
            SearchResult::proven(hand, len, amount)
        }
    }

    /// `max(sum-classified children, max-classified children)`, plus a
    /// penalty for the overlap between aliased drop/non-drop groups that
    /// naive summation would otherwise double-count.
    fn aggregate_delta(&self) -> PnDn {
        let active = &self.idx[self.excluded_moves..];
        let (best, rest) = active.split_first().expect("current_result only called with at least one active child");

        let mut sum_part: PnDn = 0;
        let mut max_part: PnDn = 0;
        for &i in rest {
            let d = self.results[i].delta(self.or_node);
            if self.sum_mask.test(i) {
                sum_part = saturating_add(sum_part, d);
            } else {
                max_part = max_part.max(d);
            }
        }
        let except_best = saturating_add(sum_part, max_part);
        let best_delta = self.results[*best].delta(self.or_node);
        let penalty = delta_penalty(self.num_drop_moves, self.num_nondrop_moves);
        saturating_add(except_best.max(best_delta), penalty)
    }
}

fn delta_penalty(num_drop_moves: u32, num_nondrop_moves: u32) -> PnDn {
    let extra = (num_drop_moves + num_nondrop_moves).saturating_sub(1) as PnDn;
    saturating_add(extra.saturating_mul(PN_DN_UNIT), 0)
}

fn ordering3_to_std(o: Ordering3) -> Ordering {
    match o {
        Ordering3::Less => Ordering::Less,
        Ordering3::Equivalent => Ordering::Equal,
        Ordering3::Greater => Ordering::Greater,
    }
}

/// Reconstructs the hand needed *before* playing `mv`, undoing the one hand
/// change the move itself causes: a drop removes a piece from hand (so it
/// must be added back), a capture adds one (so it must be removed). Only
/// meaningful when `or_node`, since only the OR side's own move changes its
/// hand.
fn proof_hand_before_move(or_node: bool, mv: Move, captured: Option<HandPiece>, child_hand: Hand) -> Hand {
    if !or_node {
        return child_hand;
    }
    match mv {
        Move::Drop { piece, .. } => child_hand.add(piece, 1),
        Move::Normal { .. } => match captured {
            Some(piece) => child_hand.remove(piece, 1),
            None => child_hand,
        },
    }
}

/// A child with no TT history yet: seeded with the df-pn+ one-unit initial
/// estimate, short-circuited by a one-ply mate/no-mate check when this
/// expansion belongs to an AND node (so the child is the attacker's turn).
fn fresh_child_result<P, M>(node: &mut Node<'_, P>, movegen: &M, mv: Move, hand: Hand, target_len: MateLen) -> SearchResult
where
    P: MateSearchPosition,
    M: MoveGenerator<P>,
{
    if !node.is_or_node() {
        node.do_move(mv);
        let mate = node.check_mate_1ply(movegen);
        node.undo_move();
        if let Some((_, proof_hand)) = mate {
            return SearchResult::proven(proof_hand, MateLen::ZERO.succ(), 1);
        }
    }

    SearchResult::unknown(
        PN_DN_UNIT,
        PN_DN_UNIT,
        hand,
        target_len,
        1,
        UnknownData {
            is_first_visit: true,
            parent_board_key: node.board_key(),
            parent_hand: node.or_hand(),
            sum_mask: BitSet64::NONE,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::HandPiece;
    use crate::shogi::board::Board;
    use crate::shogi::movegen::NaiveMoveGenerator;
    use crate::shogi::types::{PieceType, Square};
    use crate::tt::TranspositionTable;
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
    fn test_fresh_child_result_detects_one_ply_mate_for_and_node_child() {
        // Black (defender, in check elsewhere) escapes to (0,8) by playing
        // `mv`; from there White has the same lance-drop mate exercised by
        // `position::tests::test_mate_1ply_finds_lance_drop_mate`. This
        // `Node` plays the role of an AND node (defender to move), so
        // `fresh_child_result` should take the one-ply-mate shortcut rather
        // than falling back to an unknown estimate.
        let mut board = Board::empty();
        board.place(Square::new(1, 8), crate::shogi::types::Piece { color: Color::Black, piece_type: PieceType::King });
        board.set_attacker_king(Square::new(2, 7));
        board.give_hand(Color::White, HandPiece::Lance, 1);
        board.set_side_to_move(Color::Black);

        let mut node = Node::new(&mut board, false, 0, 1);
        let movegen = NaiveMoveGenerator;
        let mv = Move::Normal { from: Square::new(1, 8), to: Square::new(0, 8), promote: false };

        let result = fresh_child_result(&mut node, &movegen, mv, Hand::ZERO, MateLen::new(5));
        assert!(result.is_proven(), "the evasion walks straight into a one-ply mate");
        assert_eq!(result.hand().count(HandPiece::Lance), 1);
        assert_eq!(result.len().len(), 1);
    }

    #[test]
    fn test_obvious_result_when_and_node_has_no_evasions() {
        // Defender's king in the corner, checked by a lance with no legal
        // reply: zero generated moves at an AND node means mate.
        let tt = TranspositionTable::new(1);
        let mut board = Board::empty();
        board.set_defender_king(Square::new(0, 8));
        board.set_attacker_king(Square::new(2, 7));
        board.place(
            Square::new(0, 0),
            crate::shogi::types::Piece { color: Color::White, piece_type: PieceType::Lance },
        );
        board.set_side_to_move(Color::Black);
        let mut node = Node::new(&mut board, false, 0, 1);
        let movegen = NaiveMoveGenerator;
        let expansion = LocalExpansion::new(&tt, &mut node, &movegen, MateLen::new(5), 1);

        assert!(expansion.is_empty());
        let result = expansion.current_result(&node);
        assert!(result.is_proven());
    }

    #[test]
    fn test_front_move_is_best_sorted_candidate() {
        let tt = TranspositionTable::new(1);
        let mut board = lance_mate_board();
        let mut node = Node::new(&mut board, true, 0, 0);
        let movegen = NaiveMoveGenerator;
        let expansion = LocalExpansion::new(&tt, &mut node, &movegen, MateLen::new(5), 1);

        assert_eq!(
            expansion.front_move(),
            Some(Move::Drop { piece: HandPiece::Lance, to: Square::new(0, 0) })
        );
    }
}
