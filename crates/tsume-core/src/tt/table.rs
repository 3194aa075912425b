//! The regular (non-repetition) transposition table: entries keyed by
//! `(board_key, hand)`, stored in fixed-size clusters addressed by
//! `board_key`, each behind its own lock so concurrent probes rarely
//! contend.
//!
//! Grounded on `komori::BoardCluster` / `NodeTable`: a flat backing `Vec`
//! sliced into overlapping clusters in the original; here each cluster owns
//! its storage directly, which is simpler and fine at the scale this crate
//! targets (tens of millions of entries, not the full engine's billions).

use crate::error::{Result, TsumeError};
use crate::hand::Hand;
use crate::tt::entry::{Entry, RECORD_LEN};
use parking_lot::Mutex;
use std::io::{Read, Write};

pub const CLUSTER_SIZE: usize = 16;

/// A cluster at or above this occupancy is a GC candidate (`kGcThreshold`).
const GC_THRESHOLD: usize = CLUSTER_SIZE - 1;
/// Entries evicted from a GC'd cluster, lowest-`gc_priority` first
/// (`kGcRemoveElementNum`).
const GC_REMOVE_ELEMENT_NUM: usize = 4;

struct Cluster {
    entries: Mutex<Vec<Entry>>,
}

impl Cluster {
    fn new() -> Cluster {
        Cluster {
            entries: Mutex::new(Vec::with_capacity(CLUSTER_SIZE)),
        }
    }
}

/// The board-key-addressed transposition table.
pub struct RegularTable {
    clusters: Vec<Cluster>,
}

impl RegularTable {
    pub fn new(num_clusters: usize) -> RegularTable {
        let num_clusters = num_clusters.max(1);
        RegularTable {
            clusters: (0..num_clusters).map(|_| Cluster::new()).collect(),
        }
    }

    fn cluster_index(&self, board_key: u64) -> usize {
        (board_key as usize) % self.clusters.len()
    }

    /// Finds the entry for `(board_key, hand)`, creating it (and evicting
    /// the least-established entry in the cluster if it's full) when absent.
    pub fn look_up_with_creation<R>(&self, board_key: u64, hand: Hand, f: impl FnOnce(&mut Entry) -> R) -> R {
        let idx = self.cluster_index(board_key);
        let mut entries = self.clusters[idx].entries.lock();

        if let Some(pos) = entries.iter().position(|e| e.is_for_hand(board_key, hand)) {
            return f(&mut entries[pos]);
        }

        if entries.len() >= CLUSTER_SIZE {
            if let Some(pos) = entries.iter().position(|e| e.is_empty()) {
                entries.remove(pos);
            } else {
                entries.remove(0);
            }
        }
        entries.push(Entry::new(board_key, hand));
        let last = entries.len() - 1;
        f(&mut entries[last])
    }

    /// Read-only probe: every entry in the cluster sharing `board_key`,
    /// regardless of hand (used to resolve superior/inferior hands).
    pub fn probe_cluster<R>(&self, board_key: u64, f: impl FnOnce(&[Entry]) -> R) -> R {
        let idx = self.cluster_index(board_key);
        let entries = self.clusters[idx].entries.lock();
        let matching: Vec<Entry> = entries.iter().filter(|e| e.is_for(board_key)).cloned().collect();
        f(&matching)
    }

    pub fn clear(&self) {
        for cluster in &self.clusters {
            cluster.entries.lock().clear();
        }
    }

    pub fn num_clusters(&self) -> usize {
        self.clusters.len()
    }

    /// Fraction of clusters that are non-empty, used as a cheap proxy for
    /// `USI hashfull`.
    pub fn hash_rate(&self) -> f64 {
        let used = self
            .clusters
            .iter()
            .filter(|c| !c.entries.lock().is_empty())
            .count();
        used as f64 / self.clusters.len() as f64
    }

    /// Evicts the lowest-`gc_priority` entries from every cluster whose
    /// occupancy has reached `GC_THRESHOLD`. Compaction (relocating entries
    /// closer to their canonical cluster head) is a no-op here: unlike the
    /// original's flat backing array with linear probing across clusters,
    /// each cluster already owns its storage directly, so there's no
    /// fragmentation across cluster boundaries to undo.
    pub fn maybe_gc(&self) {
        let mut total_evicted = 0usize;
        for cluster in &self.clusters {
            let mut entries = cluster.entries.lock();
            if entries.len() < GC_THRESHOLD {
                continue;
            }
            entries.sort_by_key(|e| e.gc_priority());
            let remove_n = GC_REMOVE_ELEMENT_NUM.min(entries.len());
            entries.drain(0..remove_n);
            total_evicted += remove_n;
        }
        if total_evicted > 0 {
            log::debug!("tt gc: evicted {total_evicted} entries across {} clusters", self.clusters.len());
        }
    }

    /// Writes every stored entry as a little-endian `u64` count followed by
    /// `count * Entry::RECORD_LEN` raw entry bytes.
    pub fn save(&self, path: &str) -> Result<()> {
        let mut body = Vec::new();
        let mut count: u64 = 0;
        for cluster in &self.clusters {
            for entry in cluster.entries.lock().iter() {
                body.extend_from_slice(&entry.encode());
                count += 1;
            }
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(&count.to_le_bytes())?;
        file.write_all(&body)?;
        log::info!("tt: saved {count} entries to {path}");
        Ok(())
    }

    /// Reads back a dump written by [`RegularTable::save`], replacing this
    /// table's current contents. Tolerant of a smaller current table than
    /// the one the dump was taken from: an entry that doesn't fit in its
    /// destination cluster evicts that cluster's least-established entry
    /// rather than growing the cluster past `CLUSTER_SIZE`.
    pub fn load(&self, path: &str) -> Result<()> {
        let mut file = std::fs::File::open(path)?;
        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;
        let count = u64::from_le_bytes(header);

        let mut body = Vec::new();
        file.read_to_end(&mut body)?;
        let expected = (count as usize).saturating_mul(RECORD_LEN);
        if body.len() != expected {
            return Err(TsumeError::TtCorrupt(format!(
                "header declares {count} entries ({expected} bytes) but {} bytes of entry data follow",
                body.len()
            )));
        }

        self.clear();
        for chunk in body.chunks_exact(RECORD_LEN) {
            let entry = Entry::decode(chunk).ok_or_else(|| TsumeError::TtCorrupt("malformed entry record".to_string()))?;
            let idx = self.cluster_index(entry.board_key());
            let mut entries = self.clusters[idx].entries.lock();
            if entries.len() < CLUSTER_SIZE {
                entries.push(entry);
            } else if let Some((i, _)) = entries.iter().enumerate().min_by_key(|(_, e)| e.gc_priority()) {
                entries[i] = entry;
            }
        }
        log::info!("tt: loaded {count} entries from {path}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pndn::INFINITE_PN_DN;

    #[test]
    fn test_creation_then_lookup_same_entry() {
        let t = RegularTable::new(64);
        t.look_up_with_creation(7, Hand::ZERO, |e| {
            e.update(0, 0, INFINITE_PN_DN, crate::mate_len::MateLen::new(3), 1)
        });
        let found =
            t.look_up_with_creation(7, Hand::ZERO, |e| e.look_up(Hand::ZERO, 0, crate::mate_len::MateLen::new(3)));
        assert!(found.is_some());
    }

    #[test]
    fn test_different_hands_get_different_entries() {
        let t = RegularTable::new(64);
        t.look_up_with_creation(7, Hand::ZERO, |e| e.update(0, 1, 1, crate::mate_len::MateLen::ZERO, 1));
        t.look_up_with_creation(7, Hand::full(), |e| e.update(0, 2, 2, crate::mate_len::MateLen::ZERO, 1));
        t.probe_cluster(7, |entries| assert_eq!(entries.len(), 2));
    }

    #[test]
    fn test_maybe_gc_evicts_lowest_amount_entries_once_over_threshold() {
        let t = RegularTable::new(1); // a single cluster, everything collides
        for i in 0..GC_THRESHOLD {
            t.look_up_with_creation(7, Hand::ZERO.add(crate::hand::HandPiece::Pawn, i as u8), |e| {
                e.update(0, 1, 1, crate::mate_len::MateLen::ZERO, (i + 1) as u32)
            });
        }
        t.probe_cluster(7, |entries| assert_eq!(entries.len(), GC_THRESHOLD));
        t.maybe_gc();
        t.probe_cluster(7, |entries| assert_eq!(entries.len(), GC_THRESHOLD - GC_REMOVE_ELEMENT_NUM));
    }

    #[test]
    fn test_maybe_gc_leaves_sparse_clusters_untouched() {
        let t = RegularTable::new(64);
        t.look_up_with_creation(7, Hand::ZERO, |e| e.update(0, 1, 1, crate::mate_len::MateLen::ZERO, 1));
        t.maybe_gc();
        t.probe_cluster(7, |entries| assert_eq!(entries.len(), 1));
    }

    #[test]
    fn test_save_then_load_round_trips_entries() {
        let path = std::env::temp_dir().join(format!("tsume_core_tt_test_{}.bin", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();

        let saved = RegularTable::new(64);
        saved.look_up_with_creation(7, Hand::ZERO, |e| {
            e.update(0, 0, INFINITE_PN_DN, crate::mate_len::MateLen::new(3), 5)
        });
        saved.save(&path_str).expect("save succeeds");

        let loaded = RegularTable::new(64);
        loaded.load(&path_str).expect("load succeeds");
        let found = loaded.look_up_with_creation(7, Hand::ZERO, |e| e.look_up(Hand::ZERO, 0, crate::mate_len::MateLen::new(3)));
        assert_eq!(found, Some((0, INFINITE_PN_DN, crate::mate_len::MateLen::new(3))));

        std::fs::remove_file(&path_str).ok();
    }

    #[test]
    fn test_load_rejects_truncated_file() {
        let path = std::env::temp_dir().join(format!("tsume_core_tt_test_truncated_{}.bin", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();
        std::fs::write(&path_str, 5u64.to_le_bytes()).unwrap(); // claims 5 entries, 0 bytes follow

        let t = RegularTable::new(64);
        assert!(t.load(&path_str).is_err());

        std::fs::remove_file(&path_str).ok();
    }
}
