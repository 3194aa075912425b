//! The df-pn+ recursion itself, driving [`Node`]/[`ExpansionStack`]/
//! [`LocalExpansion`]/[`TranspositionTable`] together into a mate solver.
//!
//! Grounded on `komori::KomoringHeights`.

use std::sync::Arc;

use crate::engine::{EngineOptions, PostSearchLevel, SearchMonitor};
use crate::expansion::{ExpansionStack, LocalExpansion};
use crate::mate_len::MateLen;
use crate::node::Node;
use crate::pndn::{saturating_add, PnDn, PN_DN_UNIT};
use crate::search_result::SearchResult;
use crate::shogi::position::{MateSearchPosition, MoveGenerator};
use crate::shogi::types::Move;
use crate::tt::TranspositionTable;

/// The resolved (or not-yet-resolved) verdict for a root position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveOutcome {
    Proven { mate_len: MateLen },
    Disproven { is_repetition: bool },
    /// The node budget or time limit was hit before either side was
    /// established.
    Unknown,
}

/// Owns the transposition table and per-search bookkeeping across repeated
/// calls to [`MateSolver::search`].
pub struct MateSolver {
    tt: TranspositionTable,
    monitor: Arc<SearchMonitor>,
    options: EngineOptions,
    best_moves: Vec<Move>,
}

impl MateSolver {
    pub fn new(options: EngineOptions) -> MateSolver {
        let tt = TranspositionTable::new(options.hash_mb);
        MateSolver {
            tt,
            monitor: Arc::new(SearchMonitor::new()),
            options,
            best_moves: Vec::new(),
        }
    }

    pub fn resize_tt(&mut self, hash_mb: u64) {
        self.tt.resize(hash_mb);
    }

    /// Direct access to the live options, for a USI frontend applying
    /// `setoption`/per-`go` overrides (e.g. a `go mate <ms>` time budget)
    /// without tearing down and losing the transposition table.
    pub fn options_mut(&mut self) -> &mut EngineOptions {
        &mut self.options
    }

    pub fn best_moves(&self) -> &[Move] {
        &self.best_moves
    }

    pub fn request_stop(&self) {
        self.monitor.request_stop();
    }

    /// A cheaply-cloneable handle a caller can stash before handing this
    /// solver off to a search thread, so `stop`/`quit` can interrupt it from
    /// another thread without needing `&mut` access back to the solver.
    pub fn monitor_handle(&self) -> Arc<SearchMonitor> {
        Arc::clone(&self.monitor)
    }

    /// Resets per-search state; clears the transposition table and monitor
    /// counters so consecutive `search` calls on unrelated positions don't
    /// see stale results. Preloads the transposition table from
    /// `options.tt_read_path` when set.
    pub fn new_search(&mut self) {
        self.tt.clear();
        self.best_moves.clear();
        self.monitor.new_search(
            self.tt.regular().num_clusters() as u64,
            self.options.nodes_limit,
            self.options.time_limit(),
        );

        if !self.options.tt_read_path.is_empty() {
            match self.tt.load(&self.options.tt_read_path) {
                Ok(()) => log::info!("tt preloaded from {}", self.options.tt_read_path),
                Err(e) => log::warn!("tt preload from {} failed: {e}", self.options.tt_read_path),
            }
        }
    }

    /// Runs iterative threshold-controlled df-pn+ against `pos`. `pos`'s
    /// current side to move is the attacker (OR side) iff `root_is_or_node`.
    ///
    /// Repeatedly widens the target mate length from 1 ply upward: df-pn+'s
    /// proven/disproven bounds are monotonic in length, so the first length
    /// at which the root proves is already the shortest mate, matching
    /// `PostSearchLevel::MinLength` without a separate shrink-from-above
    /// pass. `PostSearchLevel::None`/`UpperBound` instead search directly at
    /// the maximum representable length in one pass (no incremental
    /// widening), accepting whatever length the search converges to as an
    /// upper bound on the true minimum rather than proving minimality;
    /// `UpperBound` additionally re-runs a confirming pass at that length
    /// once resolved (spec.md §4.1's "post-search").
    pub fn search<P, M>(&mut self, pos: &mut P, root_is_or_node: bool, movegen: &M) -> SolveOutcome
    where
        P: MateSearchPosition,
        M: MoveGenerator<P>,
    {
        self.new_search();
        log::info!(
            "new search: root_is_or_node={root_is_or_node}, post_search_level={:?}, multi_pv={}",
            self.options.post_search_level,
            self.options.multi_pv
        );
        let mut node = Node::new(pos, root_is_or_node, 0, 0);

        let outcome = match self.options.post_search_level {
            PostSearchLevel::MinLength => self.search_incremental(&mut node, movegen),
            PostSearchLevel::None | PostSearchLevel::UpperBound => self.search_direct(&mut node, movegen),
        };

        if let SolveOutcome::Proven { mate_len } = outcome {
            log::info!("proof found: mate_len={mate_len}, moves={}", self.best_moves.len());
            if self.options.post_search_level == PostSearchLevel::UpperBound {
                self.post_search_confirm(&mut node, movegen, mate_len);
            }
        } else if let SolveOutcome::Disproven { is_repetition } = outcome {
            log::info!("disproven: is_repetition={is_repetition}");
        }

        if !self.options.tt_write_path.is_empty() {
            match self.tt.save(&self.options.tt_write_path) {
                Ok(()) => log::info!("tt saved to {}", self.options.tt_write_path),
                Err(e) => log::warn!("tt save to {} failed: {e}", self.options.tt_write_path),
            }
        }

        outcome
    }

    /// Widens `len` from one ply upward, stopping at the first length that
    /// proves or disproves. See `search`'s doc comment for why this already
    /// gives `MinLength`'s guarantee.
    fn search_incremental<P, M>(&mut self, node: &mut Node<'_, P>, movegen: &M) -> SolveOutcome
    where
        P: MateSearchPosition,
        M: MoveGenerator<P>,
    {
        let mut len = MateLen::new(1);
        loop {
            let result = search_entry(&self.tt, &self.monitor, node, movegen, len, self.options.multi_pv);

            if result.is_proven() {
                self.best_moves = collect_mate_path(&self.tt, node, movegen, result.len(), self.options.multi_pv);
                return SolveOutcome::Proven { mate_len: result.len() };
            }
            if result.is_disproven() {
                return SolveOutcome::Disproven {
                    is_repetition: result.is_repetition(),
                };
            }
            if self.monitor.should_stop() {
                return SolveOutcome::Unknown;
            }
            if len == MateLen::DEPTH_MAX {
                return SolveOutcome::Unknown;
            }
            log::debug!("threshold escalation: widening target length to {}", len.succ());
            len = len.succ();
        }
    }

    /// A single pass at the maximum representable length, with no
    /// incremental widening.
    fn search_direct<P, M>(&mut self, node: &mut Node<'_, P>, movegen: &M) -> SolveOutcome
    where
        P: MateSearchPosition,
        M: MoveGenerator<P>,
    {
        let result = search_entry(&self.tt, &self.monitor, node, movegen, MateLen::DEPTH_MAX, self.options.multi_pv);

        if result.is_proven() {
            self.best_moves = collect_mate_path(&self.tt, node, movegen, result.len(), self.options.multi_pv);
            SolveOutcome::Proven { mate_len: result.len() }
        } else if result.is_disproven() {
            SolveOutcome::Disproven {
                is_repetition: result.is_repetition(),
            }
        } else {
            SolveOutcome::Unknown
        }
    }

    /// `PostSearchLevel::UpperBound`'s post-search pass: re-runs the search
    /// at the already-proven length to confirm it and refresh `best_moves`
    /// from a fully populated transposition table, without changing the
    /// length already returned to the caller.
    fn post_search_confirm<P, M>(&mut self, node: &mut Node<'_, P>, movegen: &M, len: MateLen)
    where
        P: MateSearchPosition,
        M: MoveGenerator<P>,
    {
        log::debug!("post-search: confirming proof at mate_len={len} as an upper bound");
        let result = search_entry(&self.tt, &self.monitor, node, movegen, len, self.options.multi_pv);
        if result.is_proven() {
            self.best_moves = collect_mate_path(&self.tt, node, movegen, result.len(), self.options.multi_pv);
        }
    }
}

/// Wraps [`search_impl`] with thresholds starting small and doubling each
/// pass, so a caller polling between calls sees the search make monotonic
/// progress instead of committing to one huge threshold up front.
fn search_entry<P, M>(
    tt: &TranspositionTable,
    monitor: &SearchMonitor,
    node: &mut Node<'_, P>,
    movegen: &M,
    len: MateLen,
    multi_pv: u32,
) -> SearchResult
where
    P: MateSearchPosition,
    M: MoveGenerator<P>,
{
    let mut thpn: PnDn = PN_DN_UNIT;
    let mut thdn: PnDn = PN_DN_UNIT;

    loop {
        let mut stack = ExpansionStack::new();
        let result = search_impl(tt, monitor, node, movegen, thpn, thdn, len, &mut stack, multi_pv);

        if result.is_final() || monitor.should_stop() {
            return result;
        }

        log::trace!("threshold doubling: thpn={thpn} thdn={thdn} -> {} {}", saturating_add(thpn, thpn), saturating_add(thdn, thdn));
        thpn = saturating_add(thpn, thpn);
        thdn = saturating_add(thdn, thdn);
    }
}

/// The core recursive descent.
#[allow(clippy::too_many_arguments)]
fn search_impl<'a, P, M>(
    tt: &'a TranspositionTable,
    monitor: &SearchMonitor,
    node: &mut Node<'_, P>,
    movegen: &M,
    thpn: PnDn,
    thdn: PnDn,
    len: MateLen,
    stack: &mut ExpansionStack<'a>,
    multi_pv: u32,
) -> SearchResult
where
    P: MateSearchPosition,
    M: MoveGenerator<P>,
{
    monitor.visit(node.depth());
    if monitor.should_check_hashfull() {
        log::debug!("gc: hashfull check triggered at node_count={}", monitor.node_count());
        tt.maybe_gc();
        monitor.reset_next_hashfull_check();
    }

    if let Some(start) = node.is_repetition() {
        return SearchResult::repetition(node.or_hand(), MateLen::ZERO, 1, start);
    }
    let superior_or_inferior = if node.is_or_node() {
        node.is_repetition_or_superior()
    } else {
        node.is_repetition_or_inferior()
    };
    if let Some(start) = superior_or_inferior {
        return SearchResult::repetition(node.or_hand(), MateLen::ZERO, 1, start);
    }

    let board_key = node.board_key();
    let or_hand = node.or_hand();
    let expansion = LocalExpansion::new(tt, node, movegen, len, multi_pv);
    stack.push(board_key, or_hand, expansion);

    let result = loop {
        let current = stack.current().expect("just pushed");
        let cur_result = current.current_result(node);

        if cur_result.is_final() {
            break cur_result;
        }
        if !(cur_result.pn() < thpn && cur_result.dn() < thdn) {
            break cur_result;
        }
        if monitor.should_stop() {
            break cur_result;
        }

        let expansion = stack.current_mut().expect("still on stack");
        let mv = expansion.front_move().expect("a non-final current result always has an active child");
        let (child_thpn, child_thdn) = expansion.front_pn_dn_thresholds(thpn, thdn);

        node.do_move(mv);
        let child_result = search_impl(tt, monitor, node, movegen, child_thpn, child_thdn, len.pred(), stack, multi_pv);
        node.undo_move();

        stack.current_mut().expect("still on stack").update_best_child(child_result);
    };

    if result.is_final() {
        stack.eliminate_double_count(tt, node);
    }
    stack.pop();
    result
}

/// Walks a proven position down to its mate, re-deriving the best move at
/// each step from the (now fully populated) transposition table.
fn collect_mate_path<P, M>(tt: &TranspositionTable, node: &mut Node<'_, P>, movegen: &M, len: MateLen, multi_pv: u32) -> Vec<Move>
where
    P: MateSearchPosition,
    M: MoveGenerator<P>,
{
    let mut moves = Vec::new();
    let mut remaining = len;

    while remaining != MateLen::ZERO {
        let mut expansion = LocalExpansion::new(tt, node, movegen, remaining, multi_pv);
        let Some(mv) = expansion.front_move() else { break };
        moves.push(mv);
        node.do_move(mv);
        remaining = remaining.pred();
    }

    for _ in &moves {
        node.undo_move();
    }
    moves
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineOptions;
    use crate::hand::HandPiece;
    use crate::shogi::board::Board;
    use crate::shogi::movegen::NaiveMoveGenerator;
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
    fn test_search_proves_one_ply_lance_drop_mate() {
        let mut board = lance_mate_board();
        let movegen = NaiveMoveGenerator;
        let mut solver = MateSolver::new(EngineOptions::default());

        let outcome = solver.search(&mut board, true, &movegen);
        assert_eq!(outcome, SolveOutcome::Proven { mate_len: MateLen::new(1) });
        assert_eq!(solver.best_moves().len(), 1);
        assert_eq!(
            solver.best_moves()[0],
            crate::shogi::types::Move::Drop {
                piece: HandPiece::Lance,
                to: Square::new(0, 0),
            }
        );
    }

    #[test]
    fn test_search_disproves_when_defender_has_a_free_king() {
        let mut board = Board::empty();
        board.set_defender_king(Square::new(4, 4));
        board.set_attacker_king(Square::new(0, 0));
        board.set_side_to_move(Color::Black);
        let movegen = NaiveMoveGenerator;
        let mut solver = MateSolver::new(EngineOptions::default());

        let outcome = solver.search(&mut board, true, &movegen);
        assert_eq!(outcome, SolveOutcome::Disproven { is_repetition: false });
        assert!(solver.best_moves().is_empty());
    }
}
