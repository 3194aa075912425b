//! A cached handle for repeatedly probing the transposition table at one
//! `(board_key, hand, path_key, depth)` without re-deriving cluster indices
//! on every call.
//!
//! Grounded on `komori::LookUpQuery`.

use crate::hand::Hand;
use crate::mate_len::MateLen;
use crate::pndn::PnDn;
use crate::tt::reptable::RepetitionTable;
use crate::tt::table::RegularTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LookUpResult {
    pub pn: PnDn,
    pub dn: PnDn,
    pub len: MateLen,
    /// `Some(depth)` when this result came from the repetition table rather
    /// than an ordinary proof/disproof.
    pub repetition_start_depth: Option<u32>,
}

pub struct Query<'a> {
    regular: &'a RegularTable,
    repetition: &'a RepetitionTable,
    board_key: u64,
    hand: Hand,
    path_key: u64,
    depth: u32,
}

impl<'a> Query<'a> {
    pub fn new(
        regular: &'a RegularTable,
        repetition: &'a RepetitionTable,
        board_key: u64,
        hand: Hand,
        path_key: u64,
        depth: u32,
    ) -> Query<'a> {
        Query {
            regular,
            repetition,
            board_key,
            hand,
            path_key,
            depth,
        }
    }

    /// Repetition check first (cheap, path-scoped), then the regular table.
    pub fn look_up(&self, len: MateLen) -> Option<LookUpResult> {
        if let Some(start_depth) = self.repetition.contains(self.path_key) {
            return Some(LookUpResult {
                pn: crate::pndn::INFINITE_PN_DN,
                dn: 0,
                len,
                repetition_start_depth: Some(start_depth),
            });
        }

        self.regular.look_up_with_creation(self.board_key, self.hand, |e| {
            e.look_up(self.hand, self.depth, len).map(|(pn, dn, len)| LookUpResult {
                pn,
                dn,
                len,
                repetition_start_depth: None,
            })
        })
    }

    pub fn look_up_parent(&self) -> Option<(u64, Hand)> {
        self.regular
            .look_up_with_creation(self.board_key, self.hand, |e| e.parent())
    }

    pub fn set_parent(&self, parent_board_key: u64, parent_hand: Hand) {
        self.regular.look_up_with_creation(self.board_key, self.hand, |e| {
            e.update_parent(parent_board_key, parent_hand)
        });
    }

    pub fn update(&self, pn: PnDn, dn: PnDn, len: MateLen, amount: u32) {
        self.regular.look_up_with_creation(self.board_key, self.hand, |e| {
            e.update(self.depth, pn, dn, len, amount)
        });
    }

    pub fn mark_repetition(&self) {
        self.repetition.insert(self.path_key, self.depth);
    }

    pub fn board_key(&self) -> u64 {
        self.board_key
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn path_key(&self) -> u64 {
        self.path_key
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tt::table::RegularTable;

    #[test]
    fn test_mark_repetition_then_look_up_returns_repetition() {
        let regular = RegularTable::new(16);
        let repetition = RepetitionTable::new(64);
        let q = Query::new(&regular, &repetition, 1, Hand::ZERO, 999, 4);
        assert!(q.look_up(MateLen::ZERO).is_none());
        q.mark_repetition();
        let r = q.look_up(MateLen::ZERO).unwrap();
        assert_eq!(r.repetition_start_depth, Some(4));
        assert_eq!(r.dn, 0);
    }

    #[test]
    fn test_update_then_look_up() {
        let regular = RegularTable::new(16);
        let repetition = RepetitionTable::new(64);
        let q = Query::new(&regular, &repetition, 1, Hand::ZERO, 1, 0);
        q.update(0, crate::pndn::INFINITE_PN_DN, MateLen::new(2), 1);
        let r = q.look_up(MateLen::new(2)).unwrap();
        assert_eq!(r.pn, 0);
    }
}
