use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// Spectral shape of a single analysis frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SpectralFrame {
    /// Magnitude-weighted mean frequency in Hz.
    pub centroid_hz: f32,
    /// Frequency below which `rolloff_fraction` of the magnitude lies, in Hz.
    pub rolloff_hz: f32,
}

/// Hann-windowed magnitude spectrum with a cached FFT plan.
pub(crate) struct SpectralAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
}

impl SpectralAnalyzer {
    pub fn new(frame_length: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_length);
        let denom = (frame_length.max(2) - 1) as f32;
        let window = (0..frame_length)
            .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos()))
            .collect();
        Self { fft, window }
    }

    /// Describe one frame. `None` when the frame carries no spectral energy.
    pub fn analyze(
        &self,
        frame: &[f32],
        sample_rate: u32,
        rolloff_fraction: f32,
        buffer: &mut Vec<Complex<f32>>,
    ) -> Option<SpectralFrame> {
        let n = self.window.len();
        buffer.clear();
        buffer.extend(
            frame
                .iter()
                .zip(&self.window)
                .map(|(&s, &w)| Complex::new(s * w, 0.0)),
        );
        buffer.resize(n, Complex::new(0.0, 0.0));
        self.fft.process(buffer);

        let n_bins = n / 2 + 1;
        let bin_hz = sample_rate as f32 / n as f32;

        let mut total = 0.0f64;
        let mut weighted = 0.0f64;
        for (k, c) in buffer[..n_bins].iter().enumerate() {
            let mag = c.norm() as f64;
            total += mag;
            weighted += mag * k as f64 * bin_hz as f64;
        }
        if !(total > 1e-9) {
            return None;
        }

        let target = total * rolloff_fraction as f64;
        let mut cumulative = 0.0f64;
        let mut rolloff_bin = n_bins - 1;
        for (k, c) in buffer[..n_bins].iter().enumerate() {
            cumulative += c.norm() as f64;
            if cumulative >= target {
                rolloff_bin = k;
                break;
            }
        }

        Some(SpectralFrame {
            centroid_hz: (weighted / total) as f32,
            rolloff_hz: rolloff_bin as f32 * bin_hz,
        })
    }
}
