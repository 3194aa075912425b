//! A single transposition-table entry: one `(board_key, hand)` identity plus
//! a handful of `(len, pn, dn)` sub-entries recorded at different proof
//! lengths, and the parent pointer used by double-count elimination.
//!
//! Grounded on `komori::tt::detail::Entry`, simplified from its fixed-size
//! `std::array` of sub-entries to a small `SmallVec` (the cluster table
//! below caps how many entries share a slot, so the sub-entry count stays
//! bounded in practice too).

use crate::hand::{Hand, HandPiece};
use crate::mate_len::MateLen;
use crate::pndn::{PnDn, INFINITE_PN_DN};
use smallvec::SmallVec;

const SUB_ENTRY_CAP: usize = 4;

/// Bytes per sub-entry record: `len_plus_1`(4) + `final_hand_count`(4) +
/// `pn`(8) + `dn`(8) + `amount`(4).
const SUB_ENTRY_RECORD_LEN: usize = 28;

/// Fixed on-disk size of one [`Entry`], little-endian throughout:
/// `board_key`(8) + `hand`(7) + `min_depth`(4) + `has_parent`(1) +
/// `parent_board_key`(8) + `parent_hand`(7) + `sub_entry_count`(1) +
/// `SUB_ENTRY_CAP` sub-entry slots. Larger than the 64 bytes a single
/// `(pn, dn, sum_mask)`-shaped entry would need, because this entry stores
/// up to four length-indexed sub-entries rather than one scalar pair — see
/// the TT save/load note in `DESIGN.md`.
pub const RECORD_LEN: usize = 8 + 7 + 4 + 1 + 8 + 7 + 1 + SUB_ENTRY_CAP * SUB_ENTRY_RECORD_LEN;

#[derive(Debug, Clone, Copy)]
struct SubEntry {
    len: MateLen,
    pn: PnDn,
    dn: PnDn,
    amount: u32,
}

/// One board-key+hand slot's accumulated search state.
#[derive(Debug, Clone)]
pub struct Entry {
    board_key: u64,
    hand: Hand,
    min_depth: u32,
    parent: Option<(u64, Hand)>,
    sub_entries: SmallVec<[SubEntry; SUB_ENTRY_CAP]>,
}

impl Entry {
    pub fn new(board_key: u64, hand: Hand) -> Entry {
        Entry {
            board_key,
            hand,
            min_depth: u32::MAX,
            parent: None,
            sub_entries: SmallVec::new(),
        }
    }

    pub fn board_key(&self) -> u64 {
        self.board_key
    }

    pub fn hand(&self) -> Hand {
        self.hand
    }

    pub fn is_for(&self, board_key: u64) -> bool {
        self.board_key == board_key
    }

    pub fn is_for_hand(&self, board_key: u64, hand: Hand) -> bool {
        self.board_key == board_key && self.hand == hand
    }

    pub fn parent(&self) -> Option<(u64, Hand)> {
        self.parent
    }

    pub fn update_parent(&mut self, parent_board_key: u64, parent_hand: Hand) {
        self.parent = Some((parent_board_key, parent_hand));
    }

    /// Attempts to resolve `(hand, depth, len)` against the stored
    /// sub-entries, returning `Some((pn, dn, len))` when a superior or
    /// inferior sub-entry conclusively answers the query. `len` is the
    /// caller-supplied search-length bound, refined in place on a hit.
    pub fn look_up(&mut self, hand: Hand, depth: u32, len: MateLen) -> Option<(PnDn, PnDn, MateLen)> {
        if self.hand == hand {
            self.min_depth = self.min_depth.min(depth);
        }

        let is_superior = hand.dominates(self.hand);
        let is_inferior = self.hand.dominates(hand);

        let mut pn = 1;
        let mut dn = 1;
        let mut out_len = len;
        let mut resolved = false;

        for sub in &self.sub_entries {
            if is_superior && out_len >= sub.len {
                if sub.pn == 0 {
                    return Some((0, INFINITE_PN_DN, sub.len));
                } else if hand == self.hand || self.min_depth >= depth {
                    dn = dn.max(sub.dn);
                }
            }
            if is_inferior && out_len <= sub.len {
                if sub.dn == 0 {
                    return Some((INFINITE_PN_DN, 0, sub.len));
                } else if hand == self.hand || self.min_depth >= depth {
                    pn = pn.max(sub.pn);
                    if out_len == sub.len && hand == self.hand {
                        resolved = true;
                    }
                }
            }
        }

        if resolved {
            out_len = len;
            Some((pn, dn, out_len))
        } else {
            None
        }
    }

    /// Records a fresh `(len, pn, dn, amount)` sample, replacing a same-len
    /// sub-entry or evicting the weakest existing one once the cap is hit.
    pub fn update(&mut self, depth: u32, pn: PnDn, dn: PnDn, len: MateLen, amount: u32) {
        self.min_depth = self.min_depth.min(depth);

        for sub in self.sub_entries.iter_mut() {
            if sub.len == len {
                sub.pn = pn;
                sub.dn = dn;
                sub.amount = amount;
                return;
            }
            if (sub.pn == 0 && pn == 0 && sub.len <= len) || (sub.dn == 0 && dn == 0 && sub.len >= len) {
                // A strictly-dominating proof/disproof is already recorded.
                return;
            }
        }

        if self.sub_entries.len() < SUB_ENTRY_CAP {
            self.sub_entries.push(SubEntry { len, pn, dn, amount });
        } else {
            // Evict the entry with the smallest amount (least-established).
            if let Some((i, _)) = self
                .sub_entries
                .iter()
                .enumerate()
                .min_by_key(|(_, s)| s.amount)
            {
                self.sub_entries[i] = SubEntry { len, pn, dn, amount };
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sub_entries.is_empty()
    }

    /// The best (smallest) pn and dn recorded across every sub-entry, used
    /// by double-count elimination's ancestor walk, which only cares about
    /// this entry's own standing, not a hand-dominance query against it.
    pub fn pn_dn_summary(&self) -> (PnDn, PnDn) {
        let pn = self.sub_entries.iter().map(|s| s.pn).min().unwrap_or(1);
        let dn = self.sub_entries.iter().map(|s| s.dn).min().unwrap_or(1);
        (pn, dn)
    }

    /// How established this whole entry is, for GC ranking: the most-visited
    /// sub-entry's amount. Entries with no sub-entries (shouldn't normally
    /// happen outside construction) rank lowest so they're evicted first.
    pub fn gc_priority(&self) -> u32 {
        self.sub_entries.iter().map(|s| s.amount).max().unwrap_or(0)
    }

    /// Serializes this entry to the fixed-size little-endian record
    /// `RegularTable::save` writes one of per stored entry.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        let mut w = 0;

        buf[w..w + 8].copy_from_slice(&self.board_key.to_le_bytes());
        w += 8;
        for pt in HandPiece::ALL {
            buf[w] = self.hand.count(pt);
            w += 1;
        }
        buf[w..w + 4].copy_from_slice(&self.min_depth.to_le_bytes());
        w += 4;

        match self.parent {
            Some((parent_board_key, parent_hand)) => {
                buf[w] = 1;
                w += 1;
                buf[w..w + 8].copy_from_slice(&parent_board_key.to_le_bytes());
                w += 8;
                for pt in HandPiece::ALL {
                    buf[w] = parent_hand.count(pt);
                    w += 1;
                }
            }
            None => {
                w += 1 + 8 + HandPiece::NUM;
            }
        }

        buf[w] = self.sub_entries.len() as u8;
        w += 1;
        for i in 0..SUB_ENTRY_CAP {
            if let Some(sub) = self.sub_entries.get(i) {
                let (len_plus_1, final_hand_count) = sub.len.to_raw();
                buf[w..w + 4].copy_from_slice(&len_plus_1.to_le_bytes());
                w += 4;
                buf[w..w + 4].copy_from_slice(&final_hand_count.to_le_bytes());
                w += 4;
                buf[w..w + 8].copy_from_slice(&sub.pn.to_le_bytes());
                w += 8;
                buf[w..w + 8].copy_from_slice(&sub.dn.to_le_bytes());
                w += 8;
                buf[w..w + 4].copy_from_slice(&sub.amount.to_le_bytes());
                w += 4;
            } else {
                w += SUB_ENTRY_RECORD_LEN;
            }
        }
        debug_assert_eq!(w, RECORD_LEN);
        buf
    }

    /// Parses one `RECORD_LEN`-byte record back into an `Entry`; `None` on a
    /// malformed (wrong-length) slice, which `RegularTable::load` turns into
    /// `TsumeError::TtCorrupt`.
    pub fn decode(bytes: &[u8]) -> Option<Entry> {
        if bytes.len() != RECORD_LEN {
            return None;
        }
        let mut r = 0;

        let board_key = u64::from_le_bytes(bytes[r..r + 8].try_into().ok()?);
        r += 8;
        let mut hand = Hand::ZERO;
        for pt in HandPiece::ALL {
            hand = hand.add(pt, bytes[r]);
            r += 1;
        }
        let min_depth = u32::from_le_bytes(bytes[r..r + 4].try_into().ok()?);
        r += 4;

        let has_parent = bytes[r];
        r += 1;
        let parent = if has_parent != 0 {
            let parent_board_key = u64::from_le_bytes(bytes[r..r + 8].try_into().ok()?);
            r += 8;
            let mut parent_hand = Hand::ZERO;
            for pt in HandPiece::ALL {
                parent_hand = parent_hand.add(pt, bytes[r]);
                r += 1;
            }
            Some((parent_board_key, parent_hand))
        } else {
            r += 8 + HandPiece::NUM;
            None
        };

        let sub_count = bytes[r] as usize;
        r += 1;
        if sub_count > SUB_ENTRY_CAP {
            return None;
        }
        let mut sub_entries = SmallVec::new();
        for i in 0..SUB_ENTRY_CAP {
            let len_plus_1 = u32::from_le_bytes(bytes[r..r + 4].try_into().ok()?);
            r += 4;
            let final_hand_count = u32::from_le_bytes(bytes[r..r + 4].try_into().ok()?);
            r += 4;
            let pn = u64::from_le_bytes(bytes[r..r + 8].try_into().ok()?);
            r += 8;
            let dn = u64::from_le_bytes(bytes[r..r + 8].try_into().ok()?);
            r += 8;
            let amount = u32::from_le_bytes(bytes[r..r + 4].try_into().ok()?);
            r += 4;
            if i < sub_count {
                sub_entries.push(SubEntry {
                    len: MateLen::from_raw(len_plus_1, final_hand_count),
                    pn,
                    dn,
                    amount,
                });
            }
        }

        Some(Entry {
            board_key,
            hand,
            min_depth,
            parent,
            sub_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::HandPiece;

    #[test]
    fn test_update_then_exact_lookup() {
        let mut e = Entry::new(1, Hand::ZERO);
        e.update(3, 0, INFINITE_PN_DN, MateLen::new(5), 1);
        let r = e.look_up(Hand::ZERO, 3, MateLen::new(5));
        assert_eq!(r, Some((0, INFINITE_PN_DN, MateLen::new(5))));
    }

    #[test]
    fn test_superior_hand_inherits_proof() {
        let mut e = Entry::new(1, Hand::ZERO);
        e.update(3, 0, INFINITE_PN_DN, MateLen::new(5), 1);
        let richer = Hand::ZERO.add(HandPiece::Gold, 1);
        // querying with a hand that dominates the stored hand, at an
        // equal-or-longer length bound, inherits the stored proof.
        let r = e.look_up(richer, 3, MateLen::new(5));
        assert_eq!(r, Some((0, INFINITE_PN_DN, MateLen::new(5))));
    }

    #[test]
    fn test_encode_decode_round_trips_entry_without_parent() {
        let mut e = Entry::new(42, Hand::ZERO.add(HandPiece::Gold, 2));
        e.update(3, 0, INFINITE_PN_DN, MateLen::new(5), 7);
        let bytes = e.encode();
        let decoded = Entry::decode(&bytes).expect("valid record");
        assert_eq!(decoded.board_key(), e.board_key());
        assert_eq!(decoded.hand(), e.hand());
        assert_eq!(decoded.parent(), None);
        assert_eq!(decoded.pn_dn_summary(), e.pn_dn_summary());
        assert_eq!(
            decoded.look_up(Hand::ZERO.add(HandPiece::Gold, 2), 3, MateLen::new(5)),
            e.look_up(Hand::ZERO.add(HandPiece::Gold, 2), 3, MateLen::new(5))
        );
    }

    #[test]
    fn test_encode_decode_round_trips_parent_pointer() {
        let mut e = Entry::new(7, Hand::ZERO);
        e.update_parent(99, Hand::ZERO.add(HandPiece::Rook, 1));
        e.update(2, 4, 6, MateLen::new(2), 1);
        let decoded = Entry::decode(&e.encode()).expect("valid record");
        assert_eq!(decoded.parent(), Some((99, Hand::ZERO.add(HandPiece::Rook, 1))));
    }

    #[test]
    fn test_decode_rejects_wrong_length_slice() {
        assert!(Entry::decode(&[0u8; 4]).is_none());
    }
}
