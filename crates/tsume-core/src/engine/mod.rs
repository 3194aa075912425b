//! Engine-facing concerns sitting above the search core proper: USI options,
//! scoring, and search progress monitoring.

pub mod monitor;
pub mod options;

pub use monitor::SearchMonitor;
pub use options::{EngineOptions, PostSearchLevel, ScoreCalculationMethod};
