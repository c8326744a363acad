//! Post-processing of selected segments into reference clips.
//!
//! The chain runs in a fixed order: peak normalization, compression, the
//! optional speech-band filter, resampling to the conditioning rate, and
//! symmetric edge fades, then an optional loudness target. It never re-scores
//! or drops a clip.

use std::path::Path;

use rubato::{FftFixedInOut, Resampler};
use serde::Serialize;

use crate::audio::{write_wav, AudioBuffer, Segment};
use crate::candidates::Candidate;
use crate::config::{BandLimitConfig, CompressorConfig, FinishingConfig};
use crate::error::{ClipError, Result};
use crate::features::frames::{amplitude_to_db, db_to_amplitude, peak, rms};
use crate::selection::SelectionResult;

/// Input chunk size requested from the FFT resampler.
const RESAMPLER_CHUNK: usize = 1024;

/// A finished reference clip ready for the conditioning step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedClip {
    /// Where the clip came from in the source recording.
    pub segment: Segment,
    /// Composite quality score of the source segment.
    pub composite: f32,
    #[serde(skip)]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl FinishedClip {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn peak_amplitude(&self) -> f32 {
        peak(&self.samples)
    }

    /// Peak level in dBFS (`-inf` for a silent clip).
    pub fn peak_dbfs(&self) -> f32 {
        amplitude_to_db(self.peak_amplitude())
    }

    /// Write the clip to a 32-bit float WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        write_wav(path, &self.samples, self.sample_rate)
    }
}

pub struct ClipFinisher {
    config: FinishingConfig,
}

impl ClipFinisher {
    pub fn new(config: FinishingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FinishingConfig {
        &self.config
    }

    /// Run the full chain over raw samples at `sample_rate`.
    pub fn process(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<f32>> {
        let cfg = &self.config;
        let mut out = samples.to_vec();

        normalize_peak(&mut out, cfg.target_peak_dbfs);
        compress(&mut out, sample_rate, &cfg.compressor);
        if let Some(band) = &cfg.band_limit {
            band_limit(&mut out, sample_rate, band);
        }
        let mut out = resample(&out, sample_rate, cfg.output_sample_rate)?;
        apply_fades(&mut out, cfg.output_sample_rate, cfg.fade_ms);
        if let Some(loudness) = cfg.target_loudness_dbfs {
            normalize_loudness(&mut out, loudness);
        }

        Ok(out)
    }

    /// Extract one selected candidate from `source` and finish it.
    pub fn finish(&self, source: &AudioBuffer, candidate: &Candidate) -> Result<FinishedClip> {
        let raw = source.slice(&candidate.segment);
        let samples = self.process(raw.samples(), raw.sample_rate())?;
        Ok(FinishedClip {
            segment: candidate.segment,
            composite: candidate.score.composite,
            samples,
            sample_rate: self.config.output_sample_rate,
        })
    }

    /// Finish every selected candidate, keeping the selection order.
    pub fn finish_all(
        &self,
        source: &AudioBuffer,
        selection: &SelectionResult,
    ) -> Result<Vec<FinishedClip>> {
        selection
            .selected
            .iter()
            .map(|candidate| {
                let clip = self.finish(source, candidate)?;
                log::debug!(
                    "Finished {:.1}s-{:.1}s: {:.2}s at {} Hz, peak {:.1} dBFS",
                    clip.segment.start_secs(),
                    clip.segment.end_secs(),
                    clip.duration_secs(),
                    clip.sample_rate,
                    clip.peak_dbfs()
                );
                Ok(clip)
            })
            .collect()
    }
}

/// Replace NaN and infinite samples with silence.
fn zero_non_finite(samples: &mut [f32]) {
    for s in samples.iter_mut().filter(|s| !s.is_finite()) {
        *s = 0.0;
    }
}

/// Scale so the absolute peak sits at `target_dbfs`. Silent input is left alone.
///
/// Non-finite samples are zeroed first.
pub fn normalize_peak(samples: &mut [f32], target_dbfs: f32) {
    zero_non_finite(samples);
    let current = peak(samples);
    if !(current > 1e-9) || !current.is_finite() {
        return;
    }
    let gain = db_to_amplitude(target_dbfs) / current;
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Downward compression driven by a peak envelope follower.
///
/// Above the threshold the level is reduced by `1 - 1/ratio` of the excess.
pub fn compress(samples: &mut [f32], sample_rate: u32, config: &CompressorConfig) {
    if config.ratio <= 1.0 {
        return;
    }
    let coef = |ms: f32| {
        let n = ms / 1000.0 * sample_rate as f32;
        if n > 0.0 {
            (-1.0 / n).exp()
        } else {
            0.0
        }
    };
    let attack = coef(config.attack_ms);
    let release = coef(config.release_ms);
    let slope = 1.0 - 1.0 / config.ratio;

    let mut envelope = 0.0f32;
    for s in samples.iter_mut() {
        if !s.is_finite() {
            *s = 0.0;
        }
        let level = s.abs();
        let c = if level > envelope { attack } else { release };
        envelope = c * envelope + (1.0 - c) * level;

        let level_db = amplitude_to_db(envelope);
        if level_db > config.threshold_dbfs {
            let gain_db = -(level_db - config.threshold_dbfs) * slope;
            *s *= db_to_amplitude(gain_db);
        }
    }
}

/// Scale so the RMS level sits at `target_dbfs`, keeping the peak at or below 0 dBFS.
pub fn normalize_loudness(samples: &mut [f32], target_dbfs: f32) {
    let current = rms(samples);
    if !(current > 1e-9) || !current.is_finite() {
        return;
    }
    let mut gain = db_to_amplitude(target_dbfs) / current;
    let loudest = peak(samples);
    if loudest * gain > 1.0 {
        gain = 1.0 / loudest;
    }
    for s in samples.iter_mut() {
        *s *= gain;
    }
}

/// Second-order section in direct form I.
struct Biquad {
    b: [f32; 3],
    a: [f32; 2],
}

impl Biquad {
    fn high_pass(cutoff_hz: f32, sample_rate: u32) -> Self {
        let (cos_w, alpha) = Self::prewarp(cutoff_hz, sample_rate);
        let a0 = 1.0 + alpha;
        Self {
            b: [
                (1.0 + cos_w) / 2.0 / a0,
                -(1.0 + cos_w) / a0,
                (1.0 + cos_w) / 2.0 / a0,
            ],
            a: [-2.0 * cos_w / a0, (1.0 - alpha) / a0],
        }
    }

    fn low_pass(cutoff_hz: f32, sample_rate: u32) -> Self {
        let (cos_w, alpha) = Self::prewarp(cutoff_hz, sample_rate);
        let a0 = 1.0 + alpha;
        Self {
            b: [
                (1.0 - cos_w) / 2.0 / a0,
                (1.0 - cos_w) / a0,
                (1.0 - cos_w) / 2.0 / a0,
            ],
            a: [-2.0 * cos_w / a0, (1.0 - alpha) / a0],
        }
    }

    fn prewarp(cutoff_hz: f32, sample_rate: u32) -> (f32, f32) {
        let w = 2.0 * std::f32::consts::PI * cutoff_hz / sample_rate as f32;
        (w.cos(), w.sin() / (2.0 * std::f32::consts::FRAC_1_SQRT_2))
    }

    fn run(&self, samples: &mut [f32]) {
        let (mut x1, mut x2, mut y1, mut y2) = (0.0f32, 0.0f32, 0.0f32, 0.0f32);
        for s in samples.iter_mut() {
            let x = *s;
            let y = self.b[0] * x + self.b[1] * x1 + self.b[2] * x2 - self.a[0] * y1 - self.a[1] * y2;
            x2 = x1;
            x1 = x;
            y2 = y1;
            y1 = y;
            *s = y;
        }
    }
}

/// High-pass and low-pass the clip to the speech band.
///
/// Corners at or above Nyquist are skipped.
pub fn band_limit(samples: &mut [f32], sample_rate: u32, config: &BandLimitConfig) {
    let nyquist = sample_rate as f32 / 2.0;
    if config.high_pass_hz < nyquist {
        Biquad::high_pass(config.high_pass_hz, sample_rate).run(samples);
    }
    if config.low_pass_hz < nyquist {
        Biquad::low_pass(config.low_pass_hz, sample_rate).run(samples);
    }
}

/// Resample mono audio with the FFT resampler, compensating its delay.
///
/// The output holds exactly `round(len * to / from)` samples.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLER_CHUNK, 1)
            .map_err(|e| ClipError::Resample(format!("resampler init failed: {e}")))?;

    let expected = (samples.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let delay = resampler.output_delay();

    let mut output = Vec::with_capacity(expected + delay + resampler.output_frames_max());
    let mut chunk = Vec::with_capacity(resampler.input_frames_max());
    let mut pos = 0;
    while output.len() < expected + delay {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(samples.len());
        chunk.clear();
        chunk.extend_from_slice(&samples[pos..end]);
        chunk.resize(needed, 0.0);
        pos = end;

        let frames = resampler
            .process(&[&chunk], None)
            .map_err(|e| ClipError::Resample(e.to_string()))?;
        output.extend_from_slice(&frames[0]);
    }

    output.drain(..delay);
    output.truncate(expected);
    Ok(output)
}

/// Linear fade-in and fade-out of `fade_ms` each, capped at half the clip.
pub fn apply_fades(samples: &mut [f32], sample_rate: u32, fade_ms: f32) {
    let requested = (fade_ms as f64 / 1000.0 * sample_rate as f64).round() as usize;
    let fade = requested.min(samples.len() / 2);
    if fade == 0 {
        return;
    }
    let len = samples.len();
    for i in 0..fade {
        let gain = i as f32 / fade as f32;
        samples[i] *= gain;
        samples[len - 1 - i] *= gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{speech_like, tone};

    #[test]
    fn normalization_hits_target_peak() {
        let mut samples = tone(440.0, 0.2, 16_000, 1600);
        normalize_peak(&mut samples, -1.0);
        assert!((amplitude_to_db(peak(&samples)) + 1.0).abs() < 1e-3);

        let mut silent = vec![0.0; 100];
        normalize_peak(&mut silent, -1.0);
        assert!(silent.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn compression_reduces_loud_passages_only() {
        let config = CompressorConfig::default();
        let mut quiet = tone(300.0, 0.05, 16_000, 16_000);
        let original_quiet = quiet.clone();
        compress(&mut quiet, 16_000, &config);
        assert_eq!(quiet, original_quiet);

        let mut loud = tone(300.0, 0.9, 16_000, 16_000);
        compress(&mut loud, 16_000, &config);
        let tail = &loud[8_000..];
        // 0.9 peak is about 19 dB over the threshold; 2:1 halves the excess
        let tail_peak_db = amplitude_to_db(peak(tail));
        assert!(tail_peak_db < -5.0 && tail_peak_db > -14.0, "{tail_peak_db}");
    }

    #[test]
    fn band_limit_removes_rumble() {
        let sr = 16_000;
        let mut rumble = tone(10.0, 0.5, sr, sr as usize);
        band_limit(&mut rumble, sr, &BandLimitConfig::default());
        assert!(rms(&rumble[8_000..]) < 0.05 * 0.5);

        let mut voice = tone(300.0, 0.5, sr, sr as usize);
        band_limit(&mut voice, sr, &BandLimitConfig::default());
        assert!(rms(&voice[8_000..]) > 0.3);
    }

    #[test]
    fn resampling_produces_the_expected_length_and_pitch() {
        let input = tone(440.0, 0.5, 16_000, 16_000);
        let output = resample(&input, 16_000, 24_000).unwrap();
        assert_eq!(output.len(), 24_000);

        // zero crossings per second stay at ~2 x 440
        let crossings = output[2_400..21_600]
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count();
        let per_sec = crossings as f32 / 0.8;
        assert!((per_sec - 440.0).abs() < 5.0, "{per_sec}");
        assert!((rms(&output[2_400..21_600]) - 0.3536).abs() < 0.02);
    }

    #[test]
    fn same_rate_resampling_is_a_copy() {
        let input = tone(100.0, 0.3, 8_000, 800);
        assert_eq!(resample(&input, 8_000, 8_000).unwrap(), input);
        assert!(resample(&[], 8_000, 24_000).unwrap().is_empty());
    }

    #[test]
    fn fades_silence_the_edges() {
        let mut samples = vec![1.0; 1000];
        apply_fades(&mut samples, 1000, 100.0);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[999], 0.0);
        assert!((samples[50] - 0.5).abs() < 1e-6);
        assert_eq!(samples[500], 1.0);

        let mut short = vec![1.0; 3];
        apply_fades(&mut short, 1000, 100.0);
        assert_eq!(short, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn finishing_is_reproducible_and_bounded() {
        let finisher = ClipFinisher::new(FinishingConfig::default()).unwrap();
        let raw = speech_like(16_000, 8.0, 4);

        let first = finisher.process(&raw, 16_000).unwrap();
        let second = finisher.process(&raw, 16_000).unwrap();
        assert_eq!(first, second);

        assert_eq!(first.len(), 8 * 24_000);
        assert_eq!(first[0], 0.0);
        assert!(peak(&first) <= db_to_amplitude(-0.1) * 1.05);
        assert!(first.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn silent_clip_passes_through() {
        let finisher = ClipFinisher::new(FinishingConfig::default()).unwrap();
        let out = finisher.process(&vec![0.0; 16_000], 16_000).unwrap();
        assert_eq!(out.len(), 24_000);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn loudness_target_sets_final_rms() {
        let finisher = ClipFinisher::new(FinishingConfig {
            target_loudness_dbfs: Some(-20.0),
            ..Default::default()
        })
        .unwrap();
        let out = finisher.process(&tone(220.0, 0.5, 16_000, 32_000), 16_000).unwrap();
        assert!((amplitude_to_db(rms(&out)) + 20.0).abs() < 0.01);
        assert!(peak(&out) <= 1.0);
    }

    #[test]
    fn loudness_gain_is_capped_at_full_scale() {
        let mut spiky = vec![0.0f32; 1000];
        spiky[500] = 0.5;
        normalize_loudness(&mut spiky, -3.0);
        assert!((peak(&spiky) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_finite_samples_come_out_as_silence() {
        let mut raw = tone(300.0, 0.5, 16_000, 16_000);
        raw[4_000] = f32::NAN;
        raw[9_000] = f32::INFINITY;

        let mut compressed = raw.clone();
        compress(&mut compressed, 16_000, &CompressorConfig::default());
        assert!(compressed.iter().all(|s| s.is_finite()));

        let finisher = ClipFinisher::new(FinishingConfig::default()).unwrap();
        let out = finisher.process(&raw, 16_000).unwrap();
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(peak(&out) > 0.1);
    }

    #[test]
    fn invalid_finishing_config_is_rejected() {
        let config = FinishingConfig {
            output_sample_rate: 0,
            ..Default::default()
        };
        assert!(matches!(ClipFinisher::new(config), Err(ClipError::Config(_))));
    }
}
