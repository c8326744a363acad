//! Signal feature extraction.
//!
//! [`FeatureExtractor`] turns a mono buffer into a [`FeatureSet`]: an energy
//! envelope, spectral shape, a fundamental-frequency contour and a silence map,
//! summarised into the scalar descriptors the scorer works from.
//!
//! # Analysis layout
//!
//! All frame-based descriptors share one framing (2048-sample frames with a
//! 512-sample hop by default). The silence map uses consecutive hop-sized
//! blocks so that silent durations add up exactly.
//!
//! # Degenerate input
//!
//! Extraction never fails. Empty, silent or non-finite input produces a
//! feature set whose affected fields hold the sentinel `0.0` (and a silence
//! ratio of `1.0`), which the scorer maps to its worst case.
//!
//! # SNR heuristic
//!
//! `snr_estimate_db` is the "quietest-percentile noise floor" estimate: mean
//! frame power divided by the power of the quietest `noise_floor_percentile`
//! of frames. It is not a calibrated acoustic SNR, and the scoring targets are
//! tuned to its scale.

pub(crate) mod frames;
pub(crate) mod pitch;
pub mod silence;
pub(crate) mod spectral;

use rustfft::num_complex::Complex;
use serde::{Deserialize, Serialize};

use crate::audio::AudioBuffer;
use crate::config::FeatureConfig;
use crate::error::Result;

use frames::{amplitude_to_db, db_to_amplitude, frame_starts, load_frame, mean, percentile, rms, variance};
use pitch::{PitchScratch, PitchTracker};
use spectral::SpectralAnalyzer;

pub use silence::{silence_map, silence_ratio};

/// Ceiling for the SNR estimate when the noise floor is digital silence.
pub const SNR_CEILING_DB: f32 = 60.0;

/// RMS level at or below which a buffer is treated as carrying no signal.
const DEGENERATE_RMS: f32 = 1e-6;

/// Scalar acoustic descriptors of one buffer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub duration_secs: f64,
    /// Largest absolute sample value.
    pub peak_amplitude: f32,
    /// RMS over the whole buffer.
    pub rms_amplitude: f32,
    /// Mean of the per-frame RMS envelope, relative to the peak.
    pub energy_mean: f32,
    /// Variance of the per-frame RMS envelope, relative to the peak.
    pub energy_variance: f32,
    pub spectral_centroid_mean: f32,
    pub spectral_rolloff_mean: f32,
    /// Variance of the per-frame spectral centroid, in Hz².
    pub spectral_variance: f32,
    /// Mean F0 over voiced frames, in Hz.
    pub pitch_mean: f32,
    /// Coefficient of variation (std / mean) of voiced F0.
    pub pitch_variation: f32,
    pub voiced_frames: usize,
    pub silence_ratio: f32,
    pub snr_estimate_db: f32,
    /// Peak-to-RMS ratio in dB.
    pub dynamic_range_db: f32,
}

impl FeatureSet {
    fn degenerate(duration_secs: f64, peak_amplitude: f32, rms_amplitude: f32, silence_ratio: f32) -> Self {
        Self {
            duration_secs,
            peak_amplitude,
            rms_amplitude,
            silence_ratio,
            ..Default::default()
        }
    }

    /// True when the buffer carried no usable signal energy.
    pub fn is_degenerate(&self) -> bool {
        !(self.rms_amplitude > DEGENERATE_RMS) || !self.peak_amplitude.is_finite()
    }
}

/// Computes [`FeatureSet`]s with FFT plans built once for the configured frame size.
pub struct FeatureExtractor {
    config: FeatureConfig,
    spectral: SpectralAnalyzer,
    pitch: PitchTracker,
}

impl FeatureExtractor {
    /// Validate `config` and plan the FFTs for its frame length.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        let spectral = SpectralAnalyzer::new(config.frame_length);
        let pitch = PitchTracker::new(config.frame_length);
        Ok(Self {
            config,
            spectral,
            pitch,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn extract(&self, audio: &AudioBuffer) -> FeatureSet {
        let cfg = &self.config;
        let samples = audio.samples();
        let sample_rate = audio.sample_rate();
        let duration = audio.duration_secs();

        if samples.is_empty() {
            return FeatureSet::degenerate(0.0, 0.0, 0.0, 1.0);
        }

        let peak = frames::peak(samples);
        let overall_rms = rms(samples);
        if !(overall_rms > DEGENERATE_RMS) || !overall_rms.is_finite() || !peak.is_finite() {
            log::debug!("Degenerate buffer ({duration:.2}s, rms {overall_rms:e}), using sentinel features");
            let silence = if overall_rms.is_finite() {
                silence_ratio(
                    samples,
                    sample_rate,
                    cfg.hop_length,
                    cfg.silence_threshold_dbfs,
                    cfg.min_silence_ms,
                )
            } else {
                1.0
            };
            let (peak, overall_rms) = if peak.is_finite() && overall_rms.is_finite() {
                (peak, overall_rms)
            } else {
                (0.0, 0.0)
            };
            return FeatureSet::degenerate(duration, peak, overall_rms, silence);
        }

        let voiced_floor = db_to_amplitude(cfg.silence_threshold_dbfs);
        let starts = frame_starts(samples.len(), cfg.frame_length, cfg.hop_length);

        let mut frame = vec![0.0f32; cfg.frame_length];
        let mut fft_buf: Vec<Complex<f32>> = Vec::with_capacity(cfg.frame_length);
        let mut pitch_scratch = PitchScratch::default();

        let mut envelope = Vec::with_capacity(starts.len());
        let mut centroids = Vec::with_capacity(starts.len());
        let mut rolloffs = Vec::with_capacity(starts.len());
        let mut f0s = Vec::new();

        for &start in &starts {
            let real = load_frame(samples, start, &mut frame);
            let frame_rms = rms(&frame[..real]);
            envelope.push(frame_rms);

            if let Some(desc) =
                self.spectral
                    .analyze(&frame, sample_rate, cfg.rolloff_fraction, &mut fft_buf)
            {
                centroids.push(desc.centroid_hz);
                rolloffs.push(desc.rolloff_hz);
            }

            if frame_rms >= voiced_floor {
                if let Some(f0) = self.pitch.estimate(
                    &frame,
                    sample_rate,
                    cfg.pitch_min_hz,
                    cfg.pitch_max_hz,
                    cfg.voicing_threshold,
                    &mut pitch_scratch,
                ) {
                    f0s.push(f0);
                }
            }
        }

        let relative: Vec<f32> = envelope.iter().map(|&e| e / peak).collect();
        let powers: Vec<f32> = envelope.iter().map(|&e| e * e).collect();

        let (pitch_mean, pitch_variation) = pitch_statistics(&f0s, cfg.min_voiced_frames);

        let features = FeatureSet {
            duration_secs: duration,
            peak_amplitude: peak,
            rms_amplitude: overall_rms,
            energy_mean: mean(&relative),
            energy_variance: variance(&relative),
            spectral_centroid_mean: mean(&centroids),
            spectral_rolloff_mean: mean(&rolloffs),
            spectral_variance: variance(&centroids),
            pitch_mean,
            pitch_variation,
            voiced_frames: f0s.len(),
            silence_ratio: silence_ratio(
                samples,
                sample_rate,
                cfg.hop_length,
                cfg.silence_threshold_dbfs,
                cfg.min_silence_ms,
            ),
            snr_estimate_db: snr_estimate_db(&powers, cfg.noise_floor_percentile),
            dynamic_range_db: amplitude_to_db(peak / overall_rms).max(0.0),
        };

        log::trace!("{features:?}");
        features
    }
}

fn pitch_statistics(f0s: &[f32], min_voiced_frames: usize) -> (f32, f32) {
    let pitch_mean = mean(f0s);
    if f0s.len() < min_voiced_frames.max(1) || !(pitch_mean > 0.0) {
        return (pitch_mean, 0.0);
    }
    (pitch_mean, variance(f0s).sqrt() / pitch_mean)
}

/// Mean frame power over the `percentile` quietest frame power, in dB.
fn snr_estimate_db(powers: &[f32], percentile_rank: f32) -> f32 {
    let mean_power = mean(powers);
    if !(mean_power > DEGENERATE_RMS * DEGENERATE_RMS) {
        return 0.0;
    }
    let noise_floor = percentile(powers, percentile_rank);
    let ceiling_ratio = db_to_amplitude(SNR_CEILING_DB).powi(2);
    if !(noise_floor * ceiling_ratio > mean_power) {
        return SNR_CEILING_DB;
    }
    (10.0 * (mean_power / noise_floor).log10()).clamp(0.0, SNR_CEILING_DB)
}
