//! Deterministic synthetic signals shared by unit tests.

use std::f32::consts::PI;

pub(crate) fn tone(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| amplitude * (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Uniform noise in `[-amplitude, amplitude]` from a xorshift generator.
pub(crate) fn noise(amplitude: f32, len: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9e37_79b9) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            amplitude * (2.0 * (state as f32 / u32::MAX as f32) - 1.0)
        })
        .collect()
}

/// Voiced phrases with a drifting pitch contour, syllabic loudness changes and
/// short breathing pauses, over a faint noise floor.
///
/// Each second holds 0.71 s of harmonic "speech" followed by a 0.29 s pause,
/// shorter than the default minimum silence run.
pub(crate) fn speech_like(sample_rate: u32, secs: f32, seed: u32) -> Vec<f32> {
    let len = (secs * sample_rate as f32).round() as usize;
    let sr = sample_rate as f32;
    let offset = seed as f32 * 0.37;
    let floor = noise(0.0005, len, seed.wrapping_add(7));

    let mut phase = 0.0f32;
    (0..len)
        .map(|i| {
            let t = i as f32 / sr;
            let f0 = 130.0 + 35.0 * (2.0 * PI * 0.4 * t + offset).sin();
            phase = (phase + 2.0 * PI * f0 / sr) % (2.0 * PI);

            let in_pause = (t + offset).fract() >= 0.71;
            let voiced = if in_pause {
                0.0
            } else {
                let envelope = 0.2 * (0.7 + 0.3 * (2.0 * PI * 4.0 * t).sin());
                let wave: f32 = (1..=5).map(|h| (phase * h as f32).sin() / h as f32).sum();
                envelope * wave
            };
            voiced + floor[i]
        })
        .collect()
}
