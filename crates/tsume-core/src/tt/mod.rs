//! Transposition table: the two-layer memory the search shares between
//! threads.
//!
//! - [`entry::Entry`] / [`table::RegularTable`]: board-key-clustered storage
//!   for ordinary (non-repeated) search results.
//! - [`reptable::RepetitionTable`]: path-key-keyed set used purely to flag
//!   repetitions.
//! - [`query::Query`]: the per-node handle bundling both lookups together so
//!   callers never juggle raw keys.

mod entry;
mod query;
mod reptable;
mod table;

pub use entry::Entry;
pub use query::{LookUpResult, Query};
pub use reptable::RepetitionTable;
pub use table::{RegularTable, CLUSTER_SIZE};

use crate::error::Result;
use crate::hand::Hand;

/// Owns both halves of the transposition table and hands out [`Query`]
/// handles. Sized from `USI_Hash` megabytes, split `kNormalRepetitionRatio`
/// / remainder between the regular table and the repetition table.
pub struct TranspositionTable {
    regular: RegularTable,
    repetition: RepetitionTable,
}

const NORMAL_REPETITION_RATIO: f64 = 0.95;
const BYTES_PER_CLUSTER_ENTRY: usize = 64;
const BYTES_PER_REPETITION_ENTRY: usize = 16;

impl TranspositionTable {
    pub fn new(hash_mb: u64) -> TranspositionTable {
        let total_bytes = (hash_mb as usize).max(1) * 1024 * 1024;
        let regular_bytes = (total_bytes as f64 * NORMAL_REPETITION_RATIO) as usize;
        let repetition_bytes = total_bytes - regular_bytes;

        let num_clusters = (regular_bytes / (BYTES_PER_CLUSTER_ENTRY * CLUSTER_SIZE)).max(1);
        let rep_size = (repetition_bytes / BYTES_PER_REPETITION_ENTRY).max(1);

        TranspositionTable {
            regular: RegularTable::new(num_clusters),
            repetition: RepetitionTable::new(rep_size),
        }
    }

    pub fn resize(&mut self, hash_mb: u64) {
        *self = TranspositionTable::new(hash_mb);
    }

    pub fn clear(&self) {
        self.regular.clear();
        self.repetition.clear();
    }

    pub fn build_query(&self, board_key: u64, hand: Hand, path_key: u64, depth: u32) -> Query<'_> {
        Query::new(&self.regular, &self.repetition, board_key, hand, path_key, depth)
    }

    /// Looks up a `(board_key, hand)` pair directly against the regular
    /// table, with no path key or depth involved. Used by double-count
    /// elimination, which walks parent pointers across the whole table
    /// rather than along one search path.
    pub fn look_up_parent_pn_dn_by_key(&self, board_key: u64, hand: Hand) -> Option<((u64, Hand), crate::pndn::PnDn, crate::pndn::PnDn)> {
        self.regular.look_up_with_creation(board_key, hand, |e| {
            e.parent().map(|parent| {
                let (pn, dn) = e.pn_dn_summary();
                (parent, pn, dn)
            })
        })
    }

    pub fn regular(&self) -> &RegularTable {
        &self.regular
    }

    pub fn repetition(&self) -> &RepetitionTable {
        &self.repetition
    }

    pub fn hashfull_permille(&self) -> u32 {
        (self.regular.hash_rate() * 1000.0) as u32
    }

    /// Evicts the least-established entries from clusters that have filled
    /// up, per `RegularTable::maybe_gc`. The repetition table is unaffected:
    /// it's already self-bounding via its own generational GC.
    pub fn maybe_gc(&self) {
        self.regular.maybe_gc();
    }

    /// Dumps the regular table to `path` (spec's persisted-state layout).
    /// The repetition table isn't persisted — it's purely an in-process
    /// repetition-detection cache, cheap to rebuild from scratch.
    pub fn save(&self, path: &str) -> Result<()> {
        self.regular.save(path)
    }

    /// Replaces the regular table's contents with a dump written by `save`.
    pub fn load(&self, path: &str) -> Result<()> {
        self.regular.load(path)
    }
}
