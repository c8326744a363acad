//! Choosing reference clips from a candidate pool.
//!
//! A [`SelectionStrategy`] receives the full, already scored pool and returns
//! at most `clip_count` segments that never share more than the overlap
//! tolerance with each other, ordered by descending score.
//!
//! # Available strategies
//!
//! - [`GreedySelector`] (default): take the best remaining eligible
//!   candidate that does not collide with anything already taken.
//! - [`IntervalSchedulingSelector`]: the exact maximum-total-score subset
//!   under the same tolerance and count, via dynamic programming over
//!   candidates sorted by end time.
//!
//! # Under-supply
//!
//! Candidates under the quality or SNR floor are never used to pad the
//! result. Returning fewer clips than requested is a valid outcome reported
//! through [`SelectionResult::is_undersupplied`].

mod greedy;
mod interval;

pub use greedy::GreedySelector;
pub use interval::IntervalSchedulingSelector;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::audio::TIME_EPSILON;
use crate::candidates::{Candidate, CandidatePool};
use crate::config::SelectionConfig;

/// Common interface for clip selection strategies.
pub trait SelectionStrategy {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Pick segments from `pool` according to `config`.
    fn select(&self, pool: &CandidatePool, config: &SelectionConfig) -> SelectionResult;
}

/// Outcome of a selection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Chosen candidates, best first.
    pub selected: Vec<Candidate>,
    /// Number of clips that was asked for.
    pub requested: usize,
    /// Candidates that cleared the quality and SNR floors.
    pub eligible: usize,
    /// Size of the pool the selection ran over.
    pub considered: usize,
}

impl SelectionResult {
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn is_undersupplied(&self) -> bool {
        self.selected.len() < self.requested
    }

    /// Number of requested clips that could not be provided.
    pub fn shortfall(&self) -> usize {
        self.requested.saturating_sub(self.selected.len())
    }

    pub fn summary(&self) -> String {
        format!(
            "selected {} of {} requested ({} eligible of {} candidates)",
            self.selected.len(),
            self.requested,
            self.eligible,
            self.considered
        )
    }
}

/// True when the candidate clears both floors.
pub fn is_eligible(candidate: &Candidate, config: &SelectionConfig) -> bool {
    candidate.score.composite >= config.min_quality
        && candidate.score.features.snr_estimate_db >= config.min_snr_db
}

/// True when two segments share more than the tolerance.
pub fn conflicts(a: &Candidate, b: &Candidate, tolerance_secs: f64) -> bool {
    a.segment.overlap_secs(&b.segment) > tolerance_secs + TIME_EPSILON
}

/// Descending composite score, ties broken by earlier start, then generation order.
pub(crate) fn by_rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .composite
        .total_cmp(&a.score.composite)
        .then_with(|| a.segment.start_secs().total_cmp(&b.segment.start_secs()))
        .then_with(|| a.index.cmp(&b.index))
}

fn finish(
    strategy: &str,
    mut selected: Vec<Candidate>,
    pool: &CandidatePool,
    config: &SelectionConfig,
    eligible: usize,
) -> SelectionResult {
    selected.sort_by(by_rank);
    let result = SelectionResult {
        selected,
        requested: config.clip_count,
        eligible,
        considered: pool.len(),
    };
    if result.is_undersupplied() {
        log::warn!("{strategy}: {}", result.summary());
    } else {
        log::info!("{strategy}: {}", result.summary());
    }
    result
}
