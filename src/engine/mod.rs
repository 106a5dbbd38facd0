//! Core engine: the analysis cycle and what drives it.

pub mod analyzer;
pub mod pacing;
pub mod schedule;

pub use analyzer::{Analyzer, CycleOutcome, CycleSettings};
