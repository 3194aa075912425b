//! Engine-wide configuration, mirroring `komori::EngineOption`: everything a
//! USI `setoption` line can influence, plus the defaults a library caller
//! gets without talking to USI at all.

/// How to turn a live (pn, dn) pair into a `cp`-shaped score while the
/// search is still in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoreCalculationMethod {
    /// Don't report a score until the result is final.
    None,
    /// Report `dn` directly.
    Dn,
    /// Report `-pn` directly.
    MinusPn,
    /// Ponanza-constant win-rate-style conversion (the default).
    #[default]
    Ponanza,
}

/// How hard to search for alternate mates once the shortest one is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PostSearchLevel {
    /// Stop at the first proof.
    #[default]
    None,
    /// Keep searching until a proof matching the configured upper bound in
    /// length is found.
    UpperBound,
    /// Keep searching for the globally shortest mate.
    MinLength,
}

/// Engine-wide tunables, reloaded from USI options in `tsume-usi` or set
/// directly by a library embedder.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub hash_mb: u64,
    pub threads: u32,

    /// Node budget; `u64::MAX` means unlimited.
    pub nodes_limit: u64,
    /// Progress-report interval in milliseconds; `0` disables reporting.
    pub pv_interval_ms: u64,
    /// Wall-clock budget in milliseconds; `0` means unlimited.
    pub time_limit_ms: u64,
    /// Treat a checked root as an AND node rather than forcing OR.
    pub root_is_and_node_if_checked: bool,
    /// Keep printing the principal variation after a mate is found.
    pub show_pv_after_mate: bool,

    pub score_method: ScoreCalculationMethod,
    pub post_search_level: PostSearchLevel,

    /// Number of best lines `LocalExpansion` keeps exploring past the first
    /// that resolves; `1` disables multi-PV.
    pub multi_pv: u32,
    /// Loaded into the transposition table before a search starts; empty
    /// disables preloading.
    pub tt_read_path: String,
    /// Dumped from the transposition table after a search finishes; empty
    /// disables saving.
    pub tt_write_path: String,
}

impl Default for EngineOptions {
    fn default() -> EngineOptions {
        EngineOptions {
            hash_mb: 1024,
            threads: 1,
            nodes_limit: u64::MAX,
            pv_interval_ms: 1000,
            time_limit_ms: 0,
            root_is_and_node_if_checked: true,
            show_pv_after_mate: false,
            score_method: ScoreCalculationMethod::default(),
            post_search_level: PostSearchLevel::default(),
            multi_pv: 1,
            tt_read_path: String::new(),
            tt_write_path: String::new(),
        }
    }
}

impl EngineOptions {
    /// `val <= 0` is treated as "unlimited", matching the USI convention
    /// that a non-positive node/time limit means no limit at all.
    pub fn make_inf_if_not_positive(val: i64) -> u64 {
        if val > 0 {
            val as u64
        } else {
            u64::MAX
        }
    }

    /// `time_limit_ms` as a `Duration`, with `0` mapped to "unlimited"
    /// rather than "expire immediately".
    pub fn time_limit(&self) -> std::time::Duration {
        if self.time_limit_ms == 0 {
            std::time::Duration::MAX
        } else {
            std::time::Duration::from_millis(self.time_limit_ms)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_have_no_node_limit() {
        let o = EngineOptions::default();
        assert_eq!(o.nodes_limit, u64::MAX);
    }

    #[test]
    fn test_default_options_have_unlimited_time() {
        let o = EngineOptions::default();
        assert_eq!(o.time_limit(), std::time::Duration::MAX);
    }

    #[test]
    fn test_time_limit_ms_converts_to_milliseconds() {
        let mut o = EngineOptions::default();
        o.time_limit_ms = 2500;
        assert_eq!(o.time_limit(), std::time::Duration::from_millis(2500));
    }

    #[test]
    fn test_make_inf_if_not_positive() {
        assert_eq!(EngineOptions::make_inf_if_not_positive(100), 100);
        assert_eq!(EngineOptions::make_inf_if_not_positive(0), u64::MAX);
        assert_eq!(EngineOptions::make_inf_if_not_positive(-5), u64::MAX);
    }
}
