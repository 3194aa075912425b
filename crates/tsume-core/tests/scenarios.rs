//! End-to-end scenarios driven through [`Board::from_sfen`], exercising the
//! public `tsume-core` API the way a USI frontend would: parse a position,
//! hand it to [`MateSolver::search`] with a naive move generator, and check
//! the resulting [`SolveOutcome`].
//!
//! Each position here is a direct SFEN re-encoding of a position already
//! proven correct via direct `Board` construction in `solver.rs`'s own unit
//! tests, so the expected outcome is re-derived by hand rather than guessed.

use tsume_core::engine::EngineOptions;
use tsume_core::hand::HandPiece;
use tsume_core::mate_len::MateLen;
use tsume_core::shogi::board::Board;
use tsume_core::shogi::movegen::NaiveMoveGenerator;
use tsume_core::shogi::types::{Move, Square};
use tsume_core::solver::{MateSolver, SolveOutcome};

/// Same position as `solver::tests::lance_mate_board`: a lone defending king
/// cornered at file 1 rank 9, attacker's king at file 3 rank 8, attacker
/// holding one lance and to move. Mate in one: drop the lance on file 1.
#[test]
fn sfen_proves_one_ply_lance_drop_mate() {
    let mut board = Board::from_sfen("9/9/9/9/9/9/9/6k2/8K w l 1").expect("valid sfen");
    let movegen = NaiveMoveGenerator;
    let mut solver = MateSolver::new(EngineOptions::default());

    let outcome = solver.search(&mut board, true, &movegen);

    assert_eq!(outcome, SolveOutcome::Proven { mate_len: MateLen::new(1) });
    assert_eq!(solver.best_moves().len(), 1);
    assert_eq!(
        solver.best_moves()[0],
        Move::Drop { piece: HandPiece::Lance, to: Square::new(0, 0) }
    );
}

/// Same position as `solver::tests::test_search_disproves_when_defender_has_a_free_king`:
/// two bare kings far apart with nothing in hand. The side to move has no
/// piece capable of giving check, so the root disproves immediately.
#[test]
fn sfen_disproves_when_defender_has_a_free_king() {
    let mut board = Board::from_sfen("8k/9/9/9/4K4/9/9/9/9 b - 1").expect("valid sfen");
    let movegen = NaiveMoveGenerator;
    let mut solver = MateSolver::new(EngineOptions::default());

    let outcome = solver.search(&mut board, true, &movegen);

    assert_eq!(outcome, SolveOutcome::Disproven { is_repetition: false });
    assert!(solver.best_moves().is_empty());
}

/// A surplus hand (extra material the mating side never needs) does not
/// change the shortest mate length versus the minimal-hand lance scenario
/// above. With a rook added to hand there are now several equally short
/// mates (any rook drop on file 1 checks along the file exactly like the
/// lance), so this only pins down the length, not which drop is chosen.
#[test]
fn sfen_proves_one_ply_mate_even_with_surplus_hand() {
    let mut board = Board::from_sfen("9/9/9/9/9/9/9/6k2/8K w l4g2r 1").expect("valid sfen");
    let movegen = NaiveMoveGenerator;
    let mut solver = MateSolver::new(EngineOptions::default());

    let outcome = solver.search(&mut board, true, &movegen);

    assert_eq!(outcome, SolveOutcome::Proven { mate_len: MateLen::new(1) });
    assert_eq!(solver.best_moves().len(), 1);
}

/// `Board::from_sfen` rejects structurally invalid input rather than
/// panicking or silently producing a garbage board, so a malformed position
/// string can never reach the solver in the first place.
#[test]
fn sfen_parse_failure_is_reported_as_an_error_not_a_panic() {
    assert!(Board::from_sfen("not a sfen at all").is_err());
    assert!(Board::from_sfen("9/9/9/9/9/9/9/9 b - 1").is_err());
}
