//! Piece-in-hand multiset and the proof-hand / disproof-hand accumulators
//! built on top of it.
//!
//! A `Hand` counts how many of each of the seven droppable piece types a
//! player is holding. It supports the dominance order used throughout the
//! search (`h1 ⊇ h2`) and saturating arithmetic so a buggy caller can never
//! panic the search loop over a hand overflow.

use std::fmt;

/// The seven piece types that can be held in hand and dropped back onto the
/// board. Ordered to match common shogi notation (pawn first, rook last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HandPiece {
    Pawn = 0,
    Lance = 1,
    Knight = 2,
    Silver = 3,
    Gold = 4,
    Bishop = 5,
    Rook = 6,
}

impl HandPiece {
    pub const NUM: usize = 7;
    pub const ALL: [HandPiece; HandPiece::NUM] = [
        HandPiece::Pawn,
        HandPiece::Lance,
        HandPiece::Knight,
        HandPiece::Silver,
        HandPiece::Gold,
        HandPiece::Bishop,
        HandPiece::Rook,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Maximum number of a piece type that can physically exist in one
    /// player's hand (all four board copies minus whatever's on the board,
    /// bounded by the total count per shogi's standard piece set).
    #[inline]
    pub const fn max_count(self) -> u8 {
        match self {
            HandPiece::Pawn => 18,
            HandPiece::Lance | HandPiece::Knight | HandPiece::Silver | HandPiece::Gold => 4,
            HandPiece::Bishop | HandPiece::Rook => 2,
        }
    }
}

/// A piece-in-hand multiset for one player.
///
/// Internally a fixed-size array of counts rather than a single bit-packed
/// integer: the search engine never needs to pass hands across a socket or
/// pack them into a cache line by themselves (they travel inside
/// `SearchResult` and TT entries, which pack the whole struct), so the
/// array representation keeps `add`/`sub`/dominance straightforward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Hand {
    counts: [u8; HandPiece::NUM],
}

impl Hand {
    pub const ZERO: Hand = Hand {
        counts: [0; HandPiece::NUM],
    };

    #[inline]
    pub fn count(self, pt: HandPiece) -> u8 {
        self.counts[pt.index()]
    }

    #[inline]
    pub fn has(self, pt: HandPiece) -> bool {
        self.count(pt) > 0
    }

    /// Every piece type present in `self` at least at the count held in
    /// `other`. `full` (all-pieces-maxed) is the identity for intersection
    /// seeded by [`HandSet`]'s disproof side; `ZERO` is the identity for
    /// union seeded by the proof side.
    pub fn full() -> Hand {
        let mut h = Hand::ZERO;
        for pt in HandPiece::ALL {
            h.counts[pt.index()] = pt.max_count();
        }
        h
    }

    /// Adds `pt` to the hand, saturating at the piece's max count.
    #[inline]
    pub fn add(mut self, pt: HandPiece, n: u8) -> Hand {
        self.counts[pt.index()] = self.counts[pt.index()].saturating_add(n).min(pt.max_count());
        self
    }

    /// Removes `pt` from the hand, saturating at zero.
    #[inline]
    pub fn remove(mut self, pt: HandPiece, n: u8) -> Hand {
        self.counts[pt.index()] = self.counts[pt.index()].saturating_sub(n);
        self
    }

    pub fn merge(self, other: Hand) -> Hand {
        let mut out = self;
        for pt in HandPiece::ALL {
            out.counts[pt.index()] = out.counts[pt.index()]
                .saturating_add(other.counts[pt.index()])
                .min(pt.max_count());
        }
        out
    }

    /// `self ⊇ other`: every count in `self` is at least the matching count
    /// in `other`. The dominance order used by superior/inferior TT lookups
    /// and visit-history repetition checks.
    pub fn dominates(self, other: Hand) -> bool {
        HandPiece::ALL
            .iter()
            .all(|&pt| self.count(pt) >= other.count(pt))
    }

    pub fn total(self) -> u32 {
        self.counts.iter().map(|&c| c as u32).sum()
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.total() == 0 {
            return write!(f, "-");
        }
        for pt in HandPiece::ALL.iter().rev() {
            let c = self.count(*pt);
            if c > 0 {
                write!(f, "{:?}{} ", pt, c)?;
            }
        }
        Ok(())
    }
}

/// Which identity element to seed a [`HandSet`] accumulator with.
pub struct ProofHandTag;
pub struct DisproofHandTag;

/// Accumulates a proof hand or disproof hand across a node's children
/// without recomputing the union/intersection from scratch on every update.
///
/// Mirrors `komori::HandSet`: the proof side starts at zero and grows via
/// per-piece max as children resolve; the disproof side starts full and
/// shrinks via per-piece min.
pub struct HandSet {
    is_proof: bool,
    val: [u8; HandPiece::NUM],
}

impl HandSet {
    pub fn new_proof(_tag: ProofHandTag) -> Self {
        HandSet {
            is_proof: true,
            val: [0; HandPiece::NUM],
        }
    }

    pub fn new_disproof(_tag: DisproofHandTag) -> Self {
        let mut val = [0; HandPiece::NUM];
        for pt in HandPiece::ALL {
            val[pt.index()] = pt.max_count();
        }
        HandSet {
            is_proof: false,
            val,
        }
    }

    pub fn update(&mut self, hand: Hand) {
        for pt in HandPiece::ALL {
            let i = pt.index();
            if self.is_proof {
                self.val[i] = self.val[i].max(hand.count(pt));
            } else {
                self.val[i] = self.val[i].min(hand.count(pt));
            }
        }
    }

    /// Materializes the accumulated hand, applying the node-local correction
    /// described in spec.md §4.2 (`add_if_hand_gives_other_evasions` /
    /// `remove_if_hand_gives_other_checks`).
    pub fn get(&self, attacker_hand: Hand) -> Hand {
        let mut hand = Hand::ZERO;
        for pt in HandPiece::ALL {
            hand.counts[pt.index()] = self.val[pt.index()];
        }
        if self.is_proof {
            add_if_hand_gives_other_evasions(attacker_hand, hand)
        } else {
            remove_if_hand_gives_other_checks(attacker_hand, hand)
        }
    }
}

/// If the accumulated disproof hand contains a piece type the current node
/// doesn't actually hold, dropping that piece could have started a mate the
/// child search never considered (it isn't reachable from this node's real
/// hand). Such piece types must be stripped from the disproof hand.
///
/// `attacker_hand` is the attacker's *actual* hand at this node;
/// `disproof_hand` is the maximal disproof hand computed from the children.
pub fn remove_if_hand_gives_other_checks(attacker_hand: Hand, disproof_hand: Hand) -> Hand {
    let mut out = disproof_hand;
    for pt in HandPiece::ALL {
        if disproof_hand.has(pt) && !attacker_hand.has(pt) {
            out = out.remove(pt, pt.max_count());
        }
    }
    out
}

/// Dual of [`remove_if_hand_gives_other_checks`] for the proof side: if the
/// defender could have blocked with a piece type the attacker's hand
/// doesn't actually hold one of, that omission must be folded into the
/// proof hand (the attacker is credited with monopolizing that piece type).
pub fn add_if_hand_gives_other_evasions(attacker_hand: Hand, proof_hand: Hand) -> Hand {
    let mut out = proof_hand;
    for pt in HandPiece::ALL {
        if !attacker_hand.has(pt) {
            out = out.add(pt, pt.max_count());
        }
    }
    out
}
