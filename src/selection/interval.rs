use crate::audio::TIME_EPSILON;
use crate::candidates::{Candidate, CandidatePool};
use crate::config::SelectionConfig;

use super::{finish, is_eligible, SelectionResult, SelectionStrategy};

/// Maximum-total-score selection (weighted interval scheduling with a count cap).
///
/// Candidates are sorted by end time. Two candidates are compatible when the
/// earlier-ending one ends no later than `tolerance` after the other starts,
/// which matches the pairwise overlap rule as long as every segment is longer
/// than the tolerance. `best[i][k]` is the best total using the first `i`
/// candidates and at most `k` picks.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntervalSchedulingSelector;

impl SelectionStrategy for IntervalSchedulingSelector {
    fn name(&self) -> &'static str {
        "interval-scheduling"
    }

    fn select(&self, pool: &CandidatePool, config: &SelectionConfig) -> SelectionResult {
        let mut items: Vec<&Candidate> = pool
            .iter()
            .filter(|c| is_eligible(c, config))
            .collect();
        let eligible = items.len();
        items.sort_by(|a, b| {
            a.segment
                .end_secs()
                .total_cmp(&b.segment.end_secs())
                .then_with(|| a.segment.start_secs().total_cmp(&b.segment.start_secs()))
                .then_with(|| a.index.cmp(&b.index))
        });

        let n = items.len();
        let cap = config.clip_count.min(eligible);
        let tolerance = config.overlap_tolerance_secs;
        let ends: Vec<f64> = items.iter().map(|c| c.segment.end_secs()).collect();

        // predecessors[i]: how many of the first i items may precede item i
        let predecessors: Vec<usize> = items
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let limit = c.segment.start_secs() + tolerance + TIME_EPSILON;
                ends.partition_point(|&e| e <= limit).min(i)
            })
            .collect();

        let width = cap + 1;
        let mut best = vec![0.0f64; (n + 1) * width];
        let mut take = vec![false; (n + 1) * width];
        for i in 1..=n {
            let weight = items[i - 1].score.composite as f64;
            let p = predecessors[i - 1];
            for k in 0..=cap {
                let skip = best[(i - 1) * width + k];
                let with = if k > 0 {
                    best[p * width + k - 1] + weight
                } else {
                    f64::NEG_INFINITY
                };
                if with > skip {
                    best[i * width + k] = with;
                    take[i * width + k] = true;
                } else {
                    best[i * width + k] = skip;
                }
            }
        }

        let mut chosen = Vec::with_capacity(cap);
        let (mut i, mut k) = (n, cap);
        while i > 0 && k > 0 {
            if take[i * width + k] {
                chosen.push(items[i - 1].clone());
                k -= 1;
                i = predecessors[i - 1];
            } else {
                i -= 1;
            }
        }

        finish(self.name(), chosen, pool, config, eligible)
    }
}
