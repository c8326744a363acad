//! Fundamental-frequency tracking.
//!
//! A YIN-style estimator: the squared-difference function of a frame is built
//! from an FFT cross-correlation plus prefix sums of energy, normalized by its
//! cumulative mean, and the first dip below the voicing threshold gives the
//! period.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

pub(crate) struct PitchTracker {
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    fft_len: usize,
    frame_length: usize,
    /// Length of the integration window; also the largest usable lag.
    window_len: usize,
}

/// Reusable buffers for [`PitchTracker::estimate`].
#[derive(Default)]
pub(crate) struct PitchScratch {
    head: Vec<Complex<f32>>,
    full: Vec<Complex<f32>>,
    prefix: Vec<f64>,
    cmnd: Vec<f32>,
}

impl PitchTracker {
    pub fn new(frame_length: usize) -> Self {
        let fft_len = frame_length.next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(fft_len),
            inverse: planner.plan_fft_inverse(fft_len),
            fft_len,
            frame_length,
            window_len: frame_length / 2,
        }
    }

    /// Estimate F0 in Hz for one frame, or `None` when the frame is unvoiced.
    pub fn estimate(
        &self,
        frame: &[f32],
        sample_rate: u32,
        min_hz: f32,
        max_hz: f32,
        threshold: f32,
        scratch: &mut PitchScratch,
    ) -> Option<f32> {
        let w = self.window_len;
        let sr = sample_rate as f32;
        let tau_min = ((sr / max_hz).floor() as usize).max(2);
        let tau_max = ((sr / min_hz).ceil() as usize).min(w);
        if tau_min + 2 >= tau_max || frame.len() < self.frame_length {
            return None;
        }
        let frame = &frame[..self.frame_length];

        // r[tau] = sum_{j<w} x[j] * x[j + tau]
        let zero = Complex::new(0.0, 0.0);
        scratch.head.clear();
        scratch.head.extend(frame[..w].iter().map(|&s| Complex::new(s, 0.0)));
        scratch.head.resize(self.fft_len, zero);
        scratch.full.clear();
        scratch.full.extend(frame.iter().map(|&s| Complex::new(s, 0.0)));
        scratch.full.resize(self.fft_len, zero);

        self.forward.process(&mut scratch.head);
        self.forward.process(&mut scratch.full);
        for (h, f) in scratch.head.iter_mut().zip(&scratch.full) {
            *h = h.conj() * f;
        }
        self.inverse.process(&mut scratch.head);
        let norm = 1.0 / self.fft_len as f64;

        scratch.prefix.clear();
        scratch.prefix.push(0.0);
        let mut acc = 0.0f64;
        for &s in frame {
            acc += (s as f64) * (s as f64);
            scratch.prefix.push(acc);
        }
        let energy = |start: usize| scratch.prefix[start + w] - scratch.prefix[start];
        let e0 = energy(0);

        // Cumulative-mean-normalized difference, cmnd[0] = 1.
        scratch.cmnd.clear();
        scratch.cmnd.push(1.0);
        let mut running = 0.0f64;
        for tau in 1..=tau_max {
            let r = scratch.head[tau].re as f64 * norm;
            let d = (e0 + energy(tau) - 2.0 * r).max(0.0);
            running += d;
            let value = if running > 1e-12 {
                d * tau as f64 / running
            } else {
                1.0
            };
            scratch.cmnd.push(value as f32);
        }

        let cmnd = &scratch.cmnd;
        let mut tau = (tau_min..=tau_max).find(|&t| cmnd[t] < threshold)?;
        while tau < tau_max && cmnd[tau + 1] < cmnd[tau] {
            tau += 1;
        }

        let period = if tau > tau_min && tau < tau_max {
            let (a, b, c) = (cmnd[tau - 1], cmnd[tau], cmnd[tau + 1]);
            let curvature = a - 2.0 * b + c;
            if curvature.abs() > 1e-9 {
                tau as f32 + 0.5 * (a - c) / curvature
            } else {
                tau as f32
            }
        } else {
            tau as f32
        };

        let f0 = sr / period;
        (f0 >= min_hz && f0 <= max_hz).then_some(f0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    fn harmonic(f0: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                let t = i as f32 / SR as f32;
                (1..=4)
                    .map(|h| {
                        0.3 / h as f32 * (2.0 * std::f32::consts::PI * f0 * h as f32 * t).sin()
                    })
                    .sum()
            })
            .collect()
    }

    fn estimate(frame: &[f32]) -> Option<f32> {
        let tracker = PitchTracker::new(2048);
        let mut scratch = PitchScratch::default();
        tracker.estimate(frame, SR, 65.0, 1000.0, 0.2, &mut scratch)
    }

    #[test]
    fn tracks_pure_tone() {
        let frame: Vec<f32> = (0..2048)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 200.0 * i as f32 / SR as f32).sin())
            .collect();
        let f0 = estimate(&frame).unwrap();
        assert!((f0 - 200.0).abs() < 2.0, "f0 = {f0}");
    }

    #[test]
    fn tracks_harmonic_voice_like_signal() {
        for target in [90.0, 120.0, 180.0, 310.0] {
            let f0 = estimate(&harmonic(target, 2048)).unwrap();
            assert!(
                (f0 - target).abs() / target < 0.02,
                "target {target}, got {f0}"
            );
        }
    }

    #[test]
    fn silence_is_unvoiced() {
        assert_eq!(estimate(&[0.0; 2048]), None);
    }

    #[test]
    fn white_noise_is_unvoiced() {
        let mut state = 0x2545_f491_u32;
        let noise: Vec<f32> = (0..2048)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state as f32 / u32::MAX as f32) - 0.5
            })
            .collect();
        assert_eq!(estimate(&noise), None);
    }

    #[test]
    fn short_frame_is_unvoiced() {
        assert_eq!(estimate(&[0.1; 100]), None);
    }
}
