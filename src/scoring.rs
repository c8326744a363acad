//! Segment quality scoring.
//!
//! Each acoustic property becomes an independent sub-score in [0, 1] through a
//! monotonic clamp against a target, and the composite is their fixed-weight
//! average. Nothing is learned: every number can be traced back to one
//! property of the segment.

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::features::FeatureSet;

/// Per-property breakdown of a [`QualityScore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub snr: f32,
    pub dynamic_range: f32,
    pub pitch: f32,
    pub consistency: f32,
    pub speech: f32,
}

/// Composite quality of one segment, with the inputs it was derived from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Weighted average of the sub-scores, in [0, 1].
    pub composite: f32,
    pub sub_scores: SubScores,
    pub features: FeatureSet,
}

impl QualityScore {
    /// The composite on a 0–100 scale.
    pub fn as_percent(&self) -> f32 {
        self.composite * 100.0
    }
}

/// Clamp to [0, 1], mapping NaN to 0.
fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone)]
pub struct QualityScorer {
    config: ScoringConfig,
}

impl QualityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn sub_scores(&self, features: &FeatureSet) -> SubScores {
        let cfg = &self.config;

        let snr = unit(features.snr_estimate_db / cfg.snr_target_db);
        let dynamic_range = unit(features.dynamic_range_db / cfg.dynamic_range_target_db);

        let pitch = if features.voiced_frames == 0 {
            0.0
        } else {
            let distance = (features.pitch_variation - cfg.ideal_pitch_variation).abs();
            unit(1.0 - distance / cfg.pitch_variation_tolerance)
        };

        // A flat envelope of nothing is not consistent speech.
        let consistency = if features.is_degenerate() {
            0.0
        } else {
            unit(1.0 - features.energy_variance * cfg.energy_variance_penalty)
        };

        let speech = unit(1.0 - features.silence_ratio * cfg.silence_penalty);

        SubScores {
            snr,
            dynamic_range,
            pitch,
            consistency,
            speech,
        }
    }

    pub fn score(&self, features: FeatureSet) -> QualityScore {
        let sub_scores = self.sub_scores(&features);
        let w = &self.config.weights;
        let total = w.total();

        let composite = if total > 0.0 {
            unit(
                (w.snr * sub_scores.snr
                    + w.dynamic_range * sub_scores.dynamic_range
                    + w.pitch * sub_scores.pitch
                    + w.consistency * sub_scores.consistency
                    + w.speech * sub_scores.speech)
                    / total,
            )
        } else {
            0.0
        };

        QualityScore {
            composite,
            sub_scores,
            features,
        }
    }
}
