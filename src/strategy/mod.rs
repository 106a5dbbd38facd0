//! Strategy: value detection and per-cycle ranking.

pub mod value;

use std::cmp::Ordering;

use crate::types::Opportunity;

/// Rank candidates by `value × confidence` (best first) and keep `top_n`.
///
/// The sort is stable, so equal scores keep detection order.
pub fn select_top(mut candidates: Vec<Opportunity>, top_n: usize) -> Vec<Opportunity> {
    candidates.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));
    candidates.truncate(top_n);
    candidates
}

/// Sum of edges over all candidates of a cycle.
pub fn total_value(candidates: &[Opportunity]) -> f64 {
    candidates.iter().map(|o| o.value).sum()
}
