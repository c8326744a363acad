//! Sliding-window candidate generation.

use serde::{Deserialize, Serialize};

use crate::audio::{AudioBuffer, Segment, TIME_EPSILON};
use crate::config::WindowConfig;
use crate::features::FeatureExtractor;
use crate::scoring::{QualityScore, QualityScorer};

/// One scored window of the source recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Position in generation order.
    pub index: usize,
    pub segment: Segment,
    pub score: QualityScore,
}

/// Every scored window of one recording, in generation order.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    source_duration_secs: f64,
    window_secs: f64,
    hop_secs: f64,
}

impl CandidatePool {
    /// Build a pool from already scored candidates, e.g. when re-selecting from a report.
    pub fn from_candidates(
        candidates: Vec<Candidate>,
        source_duration_secs: f64,
        window_secs: f64,
        hop_secs: f64,
    ) -> Self {
        Self {
            candidates,
            source_duration_secs,
            window_secs,
            hop_secs,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Candidate> {
        self.candidates.iter()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn source_duration_secs(&self) -> f64 {
        self.source_duration_secs
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn hop_secs(&self) -> f64 {
        self.hop_secs
    }
}

/// Start times of every full window that fits in `total_secs`.
pub fn window_starts(total_secs: f64, window_secs: f64, hop_secs: f64) -> Vec<f64> {
    if !(window_secs > 0.0) || !(hop_secs > 0.0) || !(total_secs >= window_secs - TIME_EPSILON) {
        return Vec::new();
    }
    let mut starts = Vec::new();
    let mut k = 0usize;
    loop {
        // Multiplying rather than accumulating keeps late windows free of drift.
        let start = k as f64 * hop_secs;
        if start + window_secs > total_secs + TIME_EPSILON {
            break;
        }
        starts.push(start);
        k += 1;
    }
    starts
}

/// Slides the configured window over a recording and scores every position.
pub struct CandidateGenerator<'a> {
    window: &'a WindowConfig,
    extractor: &'a FeatureExtractor,
    scorer: &'a QualityScorer,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        window: &'a WindowConfig,
        extractor: &'a FeatureExtractor,
        scorer: &'a QualityScorer,
    ) -> Self {
        Self {
            window,
            extractor,
            scorer,
        }
    }

    pub fn generate(&self, audio: &AudioBuffer) -> CandidatePool {
        let total = audio.duration_secs();
        let window_secs = self.window.window_secs;
        let hop_secs = self.window.hop_secs();

        let starts = window_starts(total, window_secs, hop_secs);
        if starts.is_empty() {
            log::warn!(
                "Recording of {total:.2}s is shorter than one {window_secs:.2}s window, no candidates"
            );
        }

        let mut candidates = Vec::with_capacity(starts.len());
        for start in starts {
            let end = (start + window_secs).min(total);
            let segment = match Segment::new(start, end, total) {
                Ok(segment) => segment,
                Err(e) => {
                    log::warn!("Skipping window at {start:.2}s: {e}");
                    continue;
                }
            };

            let features = self.extractor.extract(&audio.slice(&segment));
            let score = self.scorer.score(features);
            log::debug!(
                "{:.1}s-{:.1}s: Q={:.3} SNR={:.1}dB silence={:.2}",
                segment.start_secs(),
                segment.end_secs(),
                score.composite,
                score.features.snr_estimate_db,
                score.features.silence_ratio
            );

            candidates.push(Candidate {
                index: candidates.len(),
                segment,
                score,
            });
        }

        log::info!(
            "Generated {} candidates ({window_secs:.1}s window, {hop_secs:.1}s hop) over {total:.1}s",
            candidates.len()
        );

        CandidatePool {
            candidates,
            source_duration_secs: total,
            window_secs,
            hop_secs,
        }
    }
}
