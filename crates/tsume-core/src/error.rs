//! Error types for the df-pn+ mate solver core.
//!
//! The search loop itself is in-process and deterministic (spec.md §7): there
//! is no error path inside `search_impl`. The only fallible operations are
//! transposition-table persistence and SFEN parsing, both of which are
//! recoverable; logic invariant violations are treated as bugs and panic via
//! `debug_assert!`/`unreachable!` instead of flowing through this type.

use thiserror::Error;

/// Recoverable error conditions exposed by the core.
#[derive(Debug, Error)]
pub enum TsumeError {
    /// The on-disk transposition-table dump could not be read or written.
    #[error("transposition table IO failed: {0}")]
    TtIo(#[from] std::io::Error),

    /// A persisted transposition-table dump had a corrupt or truncated
    /// header/body (entry count doesn't match the remaining byte length, or
    /// the magic/version tag is wrong).
    #[error("transposition table dump is corrupt: {0}")]
    TtCorrupt(String),

    /// SFEN string failed to parse into a position.
    #[error("invalid sfen: {0}")]
    InvalidSfen(String),

    /// A move string (USI-style) could not be parsed or resolved against the
    /// current position.
    #[error("invalid move: {0}")]
    InvalidMove(String),
}

pub type Result<T> = std::result::Result<T, TsumeError>;
