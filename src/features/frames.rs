//! Framing and the small statistics shared by every descriptor.

/// Start offsets of the analysis frames covering `len` samples.
///
/// A buffer shorter than one frame still yields a single frame at 0; the tail
/// after the last full frame is not analysed on its own.
pub(crate) fn frame_starts(len: usize, frame_length: usize, hop_length: usize) -> Vec<usize> {
    if len == 0 || hop_length == 0 {
        return Vec::new();
    }
    if len <= frame_length {
        return vec![0];
    }
    let count = (len - frame_length) / hop_length + 1;
    (0..count).map(|i| i * hop_length).collect()
}

/// Copy one frame into `buf`, zero-padding past the end of `samples`.
///
/// Returns the number of real samples copied.
pub(crate) fn load_frame(samples: &[f32], start: usize, buf: &mut [f32]) -> usize {
    let available = samples.len().saturating_sub(start).min(buf.len());
    buf[..available].copy_from_slice(&samples[start..start + available]);
    buf[available..].fill(0.0);
    available
}

pub(crate) fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_sq / samples.len() as f64).sqrt() as f32
}

pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

pub(crate) fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64) as f32
}

/// Population variance.
pub(crate) fn variance(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values) as f64;
    let sum: f64 = values.iter().map(|&v| (v as f64 - m).powi(2)).sum();
    (sum / values.len() as f64) as f32
}

/// Percentile with linear interpolation between closest ranks, `p` in [0, 100].
pub(crate) fn percentile(values: &[f32], p: f32) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p.clamp(0.0, 100.0) / 100.0) as f64 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = (rank - lo as f64) as f32;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Amplitude to dBFS; `-inf` for digital silence.
pub(crate) fn amplitude_to_db(amplitude: f32) -> f32 {
    20.0 * amplitude.log10()
}

pub(crate) fn db_to_amplitude(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
