use crate::candidates::{Candidate, CandidatePool};
use crate::config::SelectionConfig;

use super::{by_rank, conflicts, finish, is_eligible, SelectionResult, SelectionStrategy};

/// Best-first selection with a pairwise overlap check.
///
/// Deterministic, but not guaranteed to maximise the total score: one very
/// good window can block two slightly weaker neighbours that would together
/// be worth more. [`super::IntervalSchedulingSelector`] solves that case exactly.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedySelector;

impl SelectionStrategy for GreedySelector {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn select(&self, pool: &CandidatePool, config: &SelectionConfig) -> SelectionResult {
        let mut ranked: Vec<&Candidate> = pool
            .iter()
            .filter(|c| is_eligible(c, config))
            .collect();
        let eligible = ranked.len();
        ranked.sort_by(|a, b| by_rank(a, b));

        let cap = config.clip_count.min(eligible);
        let mut accepted: Vec<Candidate> = Vec::with_capacity(cap);
        for candidate in ranked {
            if accepted.len() >= cap {
                break;
            }
            let blocked = accepted
                .iter()
                .any(|a| conflicts(a, candidate, config.overlap_tolerance_secs));
            if !blocked {
                accepted.push(candidate.clone());
            }
        }

        finish(self.name(), accepted, pool, config, eligible)
    }
}
