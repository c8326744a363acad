use std::ops::Range;

use super::frames::{db_to_amplitude, rms};

/// Sample ranges of silence long enough to count.
///
/// The buffer is cut into consecutive `block_length` blocks; a block is silent
/// when its RMS level is below `threshold_dbfs`. Runs shorter than
/// `min_silence_ms` are ignored, except a run covering the entire buffer.
pub fn silence_map(
    samples: &[f32],
    sample_rate: u32,
    block_length: usize,
    threshold_dbfs: f32,
    min_silence_ms: f32,
) -> Vec<Range<usize>> {
    if samples.is_empty() || block_length == 0 {
        return Vec::new();
    }

    let threshold = db_to_amplitude(threshold_dbfs);
    let min_run = (min_silence_ms as f64 / 1000.0 * sample_rate as f64).round() as usize;

    let mut runs = Vec::new();
    let mut run_start: Option<usize> = None;

    let close_run = |start: usize, end: usize, runs: &mut Vec<Range<usize>>| {
        let len = end - start;
        if len >= min_run || len == samples.len() {
            runs.push(start..end);
        }
    };

    for (i, block) in samples.chunks(block_length).enumerate() {
        let offset = i * block_length;
        // NaN levels never compare below the threshold, so corrupt blocks count as sound.
        let silent = rms(block) < threshold;
        match (silent, run_start) {
            (true, None) => run_start = Some(offset),
            (false, Some(start)) => {
                close_run(start, offset, &mut runs);
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(start) = run_start {
        close_run(start, samples.len(), &mut runs);
    }

    runs
}

/// Fraction of the buffer covered by [`silence_map`] runs. Empty input is fully silent.
pub fn silence_ratio(
    samples: &[f32],
    sample_rate: u32,
    block_length: usize,
    threshold_dbfs: f32,
    min_silence_ms: f32,
) -> f32 {
    if samples.is_empty() {
        return 1.0;
    }
    let silent: usize = silence_map(samples, sample_rate, block_length, threshold_dbfs, min_silence_ms)
        .iter()
        .map(|r| r.len())
        .sum();
    silent as f32 / samples.len() as f32
}
