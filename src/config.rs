//! Pipeline configuration.
//!
//! Every stage receives its section of [`PipelineConfig`] explicitly; there is
//! no process-wide state. Defaults reproduce the tuning the scoring weights
//! were calibrated against.

use std::path::Path;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::{ClipError, Result};

/// Sliding-window geometry and clip duration bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Length of every candidate window in seconds.
    pub window_secs: f64,
    /// Shared duration between consecutive windows. Hop = window − overlap.
    pub overlap_secs: f64,
    /// Shortest acceptable clip.
    pub min_clip_secs: f64,
    /// Longest acceptable clip.
    pub max_clip_secs: f64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            window_secs: 8.0,
            overlap_secs: 2.0,
            min_clip_secs: 3.0,
            max_clip_secs: 15.0,
        }
    }
}

impl WindowConfig {
    pub fn hop_secs(&self) -> f64 {
        self.window_secs - self.overlap_secs
    }
}

/// Frame analysis parameters for the feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Analysis frame length in samples.
    pub frame_length: usize,
    /// Hop between analysis frames in samples.
    pub hop_length: usize,
    pub pitch_min_hz: f32,
    pub pitch_max_hz: f32,
    /// Normalized-difference dip below which a frame counts as voiced.
    pub voicing_threshold: f32,
    /// Below this many voiced frames the pitch variation is reported as 0.
    pub min_voiced_frames: usize,
    /// Level under which a block is considered silent.
    pub silence_threshold_dbfs: f32,
    /// Shortest silent run that counts towards the silence ratio.
    pub min_silence_ms: f32,
    /// Percentile of frame power taken as the noise floor for the SNR estimate.
    pub noise_floor_percentile: f32,
    /// Fraction of spectral magnitude below the rolloff frequency.
    pub rolloff_fraction: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            pitch_min_hz: 65.0,
            pitch_max_hz: 1000.0,
            voicing_threshold: 0.2,
            min_voiced_frames: 10,
            silence_threshold_dbfs: -40.0,
            min_silence_ms: 300.0,
            noise_floor_percentile: 10.0,
            rolloff_fraction: 0.85,
        }
    }
}

/// Relative weight of each sub-score in the composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub snr: f32,
    pub dynamic_range: f32,
    pub pitch: f32,
    pub consistency: f32,
    pub speech: f32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            snr: 1.0,
            dynamic_range: 1.0,
            pitch: 1.0,
            consistency: 1.0,
            speech: 1.0,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f32 {
        self.snr + self.dynamic_range + self.pitch + self.consistency + self.speech
    }
}

/// Targets used to map each acoustic property onto [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// SNR at which the SNR sub-score saturates.
    pub snr_target_db: f32,
    /// Peak-to-RMS ratio at which the dynamic-range sub-score saturates.
    pub dynamic_range_target_db: f32,
    /// Multiplier applied to the energy variance in the consistency sub-score.
    pub energy_variance_penalty: f32,
    /// Multiplier applied to the silence ratio in the speech sub-score.
    pub silence_penalty: f32,
    /// Pitch coefficient of variation of natural, expressive speech.
    pub ideal_pitch_variation: f32,
    /// Distance from the ideal variation at which the pitch sub-score hits 0.
    pub pitch_variation_tolerance: f32,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            snr_target_db: 25.0,
            dynamic_range_target_db: 15.0,
            energy_variance_penalty: 10.0,
            silence_penalty: 2.0,
            ideal_pitch_variation: 0.3,
            pitch_variation_tolerance: 0.3,
            weights: ScoreWeights::default(),
        }
    }
}

/// How many clips to pick and what makes a candidate eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Number of clips requested.
    pub clip_count: usize,
    /// Largest shared duration two selected segments may have.
    pub overlap_tolerance_secs: f64,
    /// Composite score floor; weaker candidates are never selected.
    pub min_quality: f32,
    /// SNR floor in dB; noisier candidates are never selected.
    pub min_snr_db: f32,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            clip_count: 5,
            overlap_tolerance_secs: 2.0,
            min_quality: 0.35,
            min_snr_db: 8.0,
        }
    }
}

/// Envelope-following downward compressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorConfig {
    pub threshold_dbfs: f32,
    pub ratio: f32,
    pub attack_ms: f32,
    pub release_ms: f32,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            threshold_dbfs: -20.0,
            ratio: 2.0,
            attack_ms: 10.0,
            release_ms: 100.0,
        }
    }
}

/// Speech-band filter corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandLimitConfig {
    pub high_pass_hz: f32,
    pub low_pass_hz: f32,
}

impl Default for BandLimitConfig {
    fn default() -> Self {
        Self {
            high_pass_hz: 80.0,
            low_pass_hz: 8000.0,
        }
    }
}

/// Post-processing applied to every selected segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinishingConfig {
    /// Peak level after normalization.
    pub target_peak_dbfs: f32,
    pub compressor: CompressorConfig,
    /// Optional speech-band filter, off unless set.
    pub band_limit: Option<BandLimitConfig>,
    /// Sample rate expected by the conditioning step.
    pub output_sample_rate: u32,
    /// Length of each edge fade.
    pub fade_ms: f32,
    /// Optional final RMS level, applied after the fades.
    pub target_loudness_dbfs: Option<f32>,
}

impl Default for FinishingConfig {
    fn default() -> Self {
        Self {
            target_peak_dbfs: -0.1,
            compressor: CompressorConfig::default(),
            band_limit: None,
            output_sample_rate: 24_000,
            fade_ms: 50.0,
            target_loudness_dbfs: None,
        }
    }
}

/// Complete configuration for one extraction run.
///
/// ```rust
/// use refclip_rs::config::{PipelineConfigBuilder, SelectionConfig};
///
/// let config = PipelineConfigBuilder::default()
///     .selection(SelectionConfig {
///         clip_count: 8,
///         ..Default::default()
///     })
///     .build()?;
/// config.validate()?;
/// # Ok::<(), refclip_rs::ClipError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Builder, Serialize, Deserialize)]
#[builder(default, build_fn(error = "ClipError"))]
#[serde(default)]
pub struct PipelineConfig {
    pub window: WindowConfig,
    pub features: FeatureConfig,
    pub scoring: ScoringConfig,
    pub selection: SelectionConfig,
    pub finishing: FinishingConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section for inconsistent or out-of-range values.
    pub fn validate(&self) -> Result<()> {
        self.window.validate()?;
        self.features.validate()?;
        self.scoring.validate()?;
        self.selection.validate(&self.window)?;
        self.finishing.validate()
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.min_clip_secs > 0.0) {
            return invalid("min_clip_secs must be positive");
        }
        if self.min_clip_secs > self.max_clip_secs {
            return invalid(format!(
                "min_clip_secs ({}) exceeds max_clip_secs ({})",
                self.min_clip_secs, self.max_clip_secs
            ));
        }
        if self.window_secs < self.min_clip_secs || self.window_secs > self.max_clip_secs {
            return invalid(format!(
                "window_secs ({}) must lie within [{}, {}]",
                self.window_secs, self.min_clip_secs, self.max_clip_secs
            ));
        }
        if !(self.overlap_secs >= 0.0) || self.overlap_secs >= self.window_secs {
            return invalid(format!(
                "overlap_secs ({}) must be in [0, window_secs)",
                self.overlap_secs
            ));
        }
        Ok(())
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.frame_length < 2 || self.hop_length == 0 {
            return invalid("frame_length must be at least 2 and hop_length non-zero");
        }
        if self.hop_length > self.frame_length {
            return invalid("hop_length must not exceed frame_length");
        }
        if !(self.pitch_min_hz > 0.0) || self.pitch_min_hz >= self.pitch_max_hz {
            return invalid(format!(
                "pitch range [{}, {}] Hz is empty",
                self.pitch_min_hz, self.pitch_max_hz
            ));
        }
        if !(self.voicing_threshold > 0.0 && self.voicing_threshold < 1.0) {
            return invalid("voicing_threshold must be in (0, 1)");
        }
        if !(self.noise_floor_percentile >= 0.0 && self.noise_floor_percentile <= 100.0) {
            return invalid("noise_floor_percentile must be in [0, 100]");
        }
        if !(self.rolloff_fraction > 0.0 && self.rolloff_fraction <= 1.0) {
            return invalid("rolloff_fraction must be in (0, 1]");
        }
        if !(self.min_silence_ms >= 0.0) {
            return invalid("min_silence_ms must not be negative");
        }
        Ok(())
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.snr_target_db > 0.0)
            || !(self.dynamic_range_target_db > 0.0)
            || !(self.pitch_variation_tolerance > 0.0)
        {
            return invalid("scoring targets and tolerance must be positive");
        }
        if !(self.energy_variance_penalty >= 0.0) || !(self.silence_penalty >= 0.0) {
            return invalid("scoring penalties must not be negative");
        }
        let weights = &self.weights;
        let all_non_negative = [
            weights.snr,
            weights.dynamic_range,
            weights.pitch,
            weights.consistency,
            weights.speech,
        ]
        .iter()
        .all(|w| *w >= 0.0);
        if !all_non_negative || !(weights.total() > 0.0) {
            return invalid("score weights must be non-negative with a positive sum");
        }
        Ok(())
    }
}

impl SelectionConfig {
    /// The overlap tolerance is checked against the window it applies to.
    pub fn validate(&self, window: &WindowConfig) -> Result<()> {
        if self.clip_count == 0 {
            return invalid("clip_count must be at least 1");
        }
        if !(self.overlap_tolerance_secs >= 0.0) || self.overlap_tolerance_secs >= window.window_secs {
            return invalid(format!(
                "overlap_tolerance_secs ({}) must be in [0, window_secs)",
                self.overlap_tolerance_secs
            ));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return invalid("min_quality must be in [0, 1]");
        }
        Ok(())
    }
}

impl FinishingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.output_sample_rate == 0 {
            return invalid("output_sample_rate must be non-zero");
        }
        if !(self.target_peak_dbfs <= 0.0) {
            return invalid("target_peak_dbfs must be at most 0 dBFS");
        }
        if let Some(loudness) = self.target_loudness_dbfs {
            if !(loudness < 0.0) {
                return invalid("target_loudness_dbfs must be below 0 dBFS");
            }
        }
        let comp = &self.compressor;
        if !(comp.ratio >= 1.0) || !(comp.attack_ms >= 0.0) || !(comp.release_ms >= 0.0) {
            return invalid("compressor needs ratio >= 1 and non-negative attack/release");
        }
        if !(self.fade_ms >= 0.0) {
            return invalid("fade_ms must not be negative");
        }
        if let Some(band) = &self.band_limit {
            if !(band.high_pass_hz > 0.0) || band.high_pass_hz >= band.low_pass_hz {
                return invalid("band_limit needs 0 < high_pass_hz < low_pass_hz");
            }
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Result<()> {
    Err(ClipError::Config(message.into()))
}
