//! Tracks node count, elapsed time, and a few derived stopping/reporting
//! conditions for one search run. Shared across worker threads via atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

const HIST_LEN: usize = 16;
const HASHFULL_CHECK_SKIP_RATIO: u32 = 4096;
/// Hashfull is checked against this fraction of capacity remaining before GC
/// kicks in, matching `kExecuteGcHashRate` in spirit.
const EXECUTE_GC_HASH_RATE: f64 = 0.5;

fn hashfull_check_interval(capacity: u64) -> u64 {
    (capacity as f64 * (1.0 - EXECUTE_GC_HASH_RATE)) as u64
}

/// A lightweight progress snapshot, the crate-internal analogue of a USI
/// `info` line's numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressInfo {
    pub sel_depth: u32,
    pub time_ms: u64,
    pub nodes: u64,
    pub nps: u64,
}

struct History {
    buf: [(Option<Instant>, u64); HIST_LEN],
    idx: usize,
    filled: bool,
}

impl History {
    fn new() -> History {
        History {
            buf: [(None, 0); HIST_LEN],
            idx: 0,
            filled: false,
        }
    }

    fn clear(&mut self) {
        *self = History::new();
    }

    fn push(&mut self, now: Instant, nodes: u64) {
        self.buf[self.idx % HIST_LEN] = (Some(now), nodes);
        self.idx += 1;
        if self.idx >= HIST_LEN {
            self.filled = true;
        }
    }

    fn oldest(&self) -> Option<(Instant, u64)> {
        if !self.filled {
            return None;
        }
        let (t, n) = self.buf[self.idx % HIST_LEN];
        t.map(|t| (t, n))
    }
}

/// Search-wide node counter, stop condition, and nps estimator.
///
/// Mirrors `komori::SearchMonitor`: kept deliberately independent of any
/// particular search algorithm so it can wrap both the df-pn+ recursion and
/// a future alpha-beta-flavored search the same way.
pub struct SearchMonitor {
    start_time: parking_lot::Mutex<Instant>,
    node_count: AtomicU64,
    max_depth: AtomicU32,
    stop: AtomicBool,

    move_limit: AtomicU64,
    time_limit: parking_lot::Mutex<Duration>,

    hashfull_check_interval: AtomicU64,
    hashfull_check_skip: AtomicU32,
    next_hashfull_check: AtomicU64,

    history: parking_lot::Mutex<History>,
}

impl SearchMonitor {
    pub fn new() -> SearchMonitor {
        SearchMonitor {
            start_time: parking_lot::Mutex::new(Instant::now()),
            node_count: AtomicU64::new(0),
            max_depth: AtomicU32::new(0),
            stop: AtomicBool::new(false),
            move_limit: AtomicU64::new(u64::MAX),
            time_limit: parking_lot::Mutex::new(Duration::MAX),
            hashfull_check_interval: AtomicU64::new(1),
            hashfull_check_skip: AtomicU32::new(HASHFULL_CHECK_SKIP_RATIO),
            next_hashfull_check: AtomicU64::new(0),
            history: parking_lot::Mutex::new(History::new()),
        }
    }

    /// Resets all counters for a fresh search run.
    pub fn new_search(&self, tt_capacity: u64, move_limit: u64, time_limit: Duration) {
        *self.start_time.lock() = Instant::now();
        self.node_count.store(0, Ordering::Relaxed);
        self.max_depth.store(0, Ordering::Relaxed);
        self.stop.store(false, Ordering::Release);
        self.move_limit.store(move_limit, Ordering::Relaxed);
        *self.time_limit.lock() = time_limit;
        self.hashfull_check_interval
            .store(hashfull_check_interval(tt_capacity).max(1), Ordering::Relaxed);
        self.reset_next_hashfull_check();
        self.history.lock().clear();
    }

    /// Reports that a node at `depth` was visited; bumps the global node
    /// counter and tracks the deepest depth reached so far.
    pub fn visit(&self, depth: u32) {
        self.node_count.fetch_add(1, Ordering::Relaxed);
        let mut cur = self.max_depth.load(Ordering::Relaxed);
        while depth > cur {
            match self
                .max_depth
                .compare_exchange_weak(cur, depth, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(observed) => cur = observed,
            }
        }
    }

    pub fn node_count(&self) -> u64 {
        self.node_count.load(Ordering::Relaxed)
    }

    pub fn should_stop(&self) -> bool {
        if self.stop.load(Ordering::Acquire) {
            return true;
        }
        let elapsed = self.start_time.lock().elapsed();
        let over_time = elapsed >= *self.time_limit.lock();
        let over_nodes = self.node_count() >= self.move_limit.load(Ordering::Relaxed);
        let stop = over_time || over_nodes;
        if stop {
            self.stop.store(true, Ordering::Release);
        }
        stop
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn should_check_hashfull(&self) -> bool {
        let prev = self.hashfull_check_skip.fetch_sub(1, Ordering::Relaxed);
        if prev > 1 {
            return false;
        }
        self.hashfull_check_skip.store(HASHFULL_CHECK_SKIP_RATIO, Ordering::Relaxed);
        self.node_count() >= self.next_hashfull_check.load(Ordering::Relaxed)
    }

    pub fn reset_next_hashfull_check(&self) {
        self.hashfull_check_skip.store(HASHFULL_CHECK_SKIP_RATIO, Ordering::Relaxed);
        let next = self.node_count() + self.hashfull_check_interval.load(Ordering::Relaxed);
        self.next_hashfull_check.store(next, Ordering::Relaxed);
    }

    /// Builds a snapshot for progress reporting, estimating nps from the
    /// node-count history when enough samples have accumulated, falling
    /// back to a whole-run average otherwise.
    pub fn info(&self) -> ProgressInfo {
        let now = Instant::now();
        let time_ms = now.duration_since(*self.start_time.lock()).as_millis() as u64;
        let nodes = self.node_count();

        let nps = match self.history.lock().oldest() {
            Some((tp, mc)) => {
                let tp_diff_ms = now.duration_since(tp).as_millis().max(1) as u64;
                (nodes.saturating_sub(mc)) * 1000 / tp_diff_ms
            }
            None => {
                if time_ms > 0 {
                    nodes * 1000 / time_ms
                } else {
                    0
                }
            }
        };

        ProgressInfo {
            sel_depth: self.max_depth.load(Ordering::Relaxed),
            time_ms,
            nodes,
            nps,
        }
    }

    /// Records a new nps sample point. The caller is expected to invoke this
    /// on a periodic alarm (e.g. every `pv_interval_ms`).
    pub fn sample(&self) {
        let now = Instant::now();
        let nodes = self.node_count();
        self.history.lock().push(now, nodes);
    }
}

impl Default for SearchMonitor {
    fn default() -> SearchMonitor {
        SearchMonitor::new()
    }
}
