//! A straightforward (no incremental attack tables, no legality shortcuts
//! beyond "does the king end up in check") move generator over [`Board`].

use crate::hand::HandPiece;
use crate::shogi::board::Board;
use crate::shogi::position::{MateSearchPosition, MoveGenerator};
use crate::shogi::types::{Move, Piece, PieceType, Square};
use crate::types::color::Color;

pub struct NaiveMoveGenerator;

fn pseudo_legal_destinations(board: &Board, from: Square, piece: Piece) -> Vec<Square> {
    let mut out = Vec::new();
    for (df, dr) in step_offsets_for(piece.piece_type, piece.color) {
        if let Some(to) = offset(from, df, dr) {
            if !own_piece_at(board, to, piece.color) {
                out.push(to);
            }
        }
    }
    for (df, dr) in slide_dirs_for(piece.piece_type, piece.color) {
        let mut cur = from;
        while let Some(to) = offset(cur, df, dr) {
            if own_piece_at(board, to, piece.color) {
                break;
            }
            out.push(to);
            if board.piece_at(to).is_some() {
                break;
            }
            cur = to;
        }
    }
    out
}

fn own_piece_at(board: &Board, sq: Square, color: Color) -> bool {
    matches!(board.piece_at(sq), Some(p) if p.color == color)
}

fn offset(sq: Square, df: i8, dr: i8) -> Option<Square> {
    let f = sq.file() as i8 + df;
    let r = sq.rank() as i8 + dr;
    if (0..9).contains(&f) && (0..9).contains(&r) {
        Some(Square::new(f as u8, r as u8))
    } else {
        None
    }
}

fn step_offsets_for(pt: PieceType, color: Color) -> Vec<(i8, i8)> {
    let black = match pt {
        PieceType::King => vec![(-1, -1), (-1, 0), (-1, 1), (0, -1), (0, 1), (1, -1), (1, 0), (1, 1)],
        PieceType::Gold | PieceType::ProPawn | PieceType::ProLance | PieceType::ProKnight | PieceType::ProSilver => {
            vec![(-1, -1), (-1, 0), (0, -1), (0, 1), (1, -1), (1, 0)]
        }
        PieceType::Silver => vec![(-1, -1), (-1, 1), (1, -1), (1, 1)],
        PieceType::Pawn => vec![(0, -1)],
        PieceType::Knight => vec![(-1, -2), (1, -2)],
        _ => vec![],
    };
    if color == Color::Black {
        black
    } else {
        black.into_iter().map(|(df, dr)| (df, -dr)).collect()
    }
}

fn slide_dirs_for(pt: PieceType, color: Color) -> &'static [(i8, i8)] {
    match (pt, color) {
        (PieceType::Lance, Color::Black) => &[(0, -1)],
        (PieceType::Lance, Color::White) => &[(0, 1)],
        (PieceType::Bishop, _) | (PieceType::Horse, _) => &[(-1, -1), (-1, 1), (1, -1), (1, 1)],
        (PieceType::Rook, _) | (PieceType::Dragon, _) => &[(-1, 0), (1, 0), (0, -1), (0, 1)],
        _ => &[],
    }
}

fn drop_destinations(board: &Board) -> Vec<Square> {
    (0..Square::NUM)
        .map(|i| Square::new((i / 9) as u8, (i % 9) as u8))
        .filter(|&sq| board.piece_at(sq).is_none())
        .collect()
}

fn leaves_own_king_in_check(board: &mut Board, mv: Move) -> bool {
    let mover = board.side_to_move();
    board.do_move(mv);
    let king_in_check = board_king_in_check(board, mover);
    board.undo_move(mv);
    king_in_check
}

fn board_king_in_check(board: &Board, color: Color) -> bool {
    // Re-derive via a throwaway side-to-move flip: Board::in_check() always
    // checks whoever is to move, so flip perspective by constructing the
    // query against the stored side if it matches, otherwise walk squares
    // directly using the same attack logic Board uses internally.
    for i in 0..Square::NUM {
        let sq = Square::new((i / 9) as u8, (i % 9) as u8);
        if matches!(board.piece_at(sq), Some(p) if p.color == color && p.piece_type == PieceType::King) {
            return square_attacked(board, sq, !color);
        }
    }
    false
}

fn square_attacked(board: &Board, target: Square, by: Color) -> bool {
    for i in 0..Square::NUM {
        let from = Square::new((i / 9) as u8, (i % 9) as u8);
        let Some(piece) = board.piece_at(from) else { continue };
        if piece.color != by {
            continue;
        }
        if pseudo_legal_destinations(board, from, piece).contains(&target) {
            return true;
        }
    }
    false
}

impl MoveGenerator<Board> for NaiveMoveGenerator {
    fn generate_moves(&self, pos: &Board) -> Vec<Move> {
        let color = pos.side_to_move();
        let mut moves = Vec::new();

        for i in 0..Square::NUM {
            let from = Square::new((i / 9) as u8, (i % 9) as u8);
            let Some(piece) = pos.piece_at(from) else { continue };
            if piece.color != color {
                continue;
            }
            for to in pseudo_legal_destinations(pos, from, piece) {
                let can_promote = !piece.piece_type.is_promoted()
                    && piece.piece_type != PieceType::King
                    && piece.piece_type != PieceType::Gold
                    && (crate::shogi::board::promotion_zone_check(color, from) || crate::shogi::board::promotion_zone_check(color, to));
                moves.push(Move::Normal {
                    from,
                    to,
                    promote: false,
                });
                if can_promote {
                    moves.push(Move::Normal { from, to, promote: true });
                }
            }
        }

        for pt in HandPiece::ALL {
            if pos.hand_of(color).has(pt) {
                for to in drop_destinations(pos) {
                    moves.push(Move::Drop { piece: pt, to });
                }
            }
        }

        let mut clone = pos.clone();
        moves.retain(|&mv| !leaves_own_king_in_check(&mut clone, mv));
        moves
    }

    fn is_check_move(&self, pos: &Board, mv: Move) -> bool {
        let mut clone = pos.clone();
        clone.do_move(mv);
        let defender = clone.side_to_move();
        let is_check = board_king_in_check(&clone, defender);
        clone.undo_move(mv);
        is_check
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lance_drop_delivers_corner_mate() {
        // Defender's king is cornered at (0,8) with two of its three
        // escape squares covered by the attacker's own king at (2,7);
        // dropping a lance on the open file checks and covers the third.
        let mut board = Board::empty();
        board.set_defender_king(Square::new(0, 8));
        board.set_attacker_king(Square::new(2, 7));
        board.give_hand(Color::White, HandPiece::Lance, 1);
        board.set_side_to_move(Color::White);

        let movegen = NaiveMoveGenerator;
        let mv = Move::Drop {
            piece: HandPiece::Lance,
            to: Square::new(0, 0),
        };
        assert!(movegen.is_check_move(&board, mv));

        let mut after = board.clone();
        after.do_move(mv);
        let defender_moves = movegen.generate_moves(&after);
        assert!(defender_moves.is_empty(), "defender should have no legal replies");
    }

    #[test]
    fn test_generate_moves_excludes_self_check() {
        // King at (4,4) is checked by a rook on file 4; a second rook on
        // rank 3, independent of the king's own square, also covers (4,3),
        // so the king may not step there even though nothing sits on it.
        let mut board = Board::empty();
        board.set_defender_king(Square::new(4, 4));
        board.place(
            Square::new(4, 0),
            Piece {
                color: Color::White,
                piece_type: PieceType::Rook,
            },
        );
        board.place(
            Square::new(0, 3),
            Piece {
                color: Color::White,
                piece_type: PieceType::Rook,
            },
        );
        board.set_side_to_move(Color::Black);
        let movegen = NaiveMoveGenerator;
        let moves = movegen.generate_moves(&board);
        assert!(moves.iter().all(|&mv| mv.to() != Square::new(4, 3)));
    }
}
