//! Source audio and time intervals into it.

use std::fs::File;
use std::io::BufReader;
use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClipError, Result};

/// Tolerance used when comparing absolute times in seconds.
pub(crate) const TIME_EPSILON: f64 = 1e-9;

/// A mono audio recording at a known sample rate.
///
/// The samples cannot be modified once the buffer exists. Windows taken with
/// [`AudioBuffer::slice`] are independent copies.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap already decoded mono samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(ClipError::UnsupportedFormat(
                "sample rate must be non-zero".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Load a WAV file, down-mixing every channel to mono.
    ///
    /// Integer PCM is scaled to [-1, 1]; float PCM is taken as is.
    pub fn load_wav(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = hound::WavReader::new(BufReader::new(file))?;
        let spec = reader.spec();

        if spec.sample_rate == 0 {
            return Err(ClipError::UnsupportedFormat(format!(
                "'{}' declares a sample rate of 0",
                path.display()
            )));
        }
        if spec.channels == 0 {
            return Err(ClipError::UnsupportedFormat(format!(
                "'{}' declares zero channels",
                path.display()
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(ClipError::UnsupportedFormat(format!(
                        "{} bits per integer sample",
                        spec.bits_per_sample
                    )));
                }
                let full_scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<_, _>>()?
            }
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<_, _>>()?,
        };

        let channels = spec.channels as usize;
        let samples: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        if samples.is_empty() {
            return Err(ClipError::EmptyAudio(path.to_path_buf()));
        }

        log::info!(
            "Loaded {} ({:.1}s, {} Hz, {} channel(s))",
            path.display(),
            samples.len() as f64 / spec.sample_rate as f64,
            spec.sample_rate,
            spec.channels
        );

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Write the buffer to a 32-bit float mono WAV file.
    pub fn write_wav(&self, path: &Path) -> Result<()> {
        write_wav(path, &self.samples, self.sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration of the audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copy the samples covered by `segment` into a new buffer.
    pub fn slice(&self, segment: &Segment) -> AudioBuffer {
        let range = segment.sample_range(self.sample_rate);
        let start = range.start.min(self.samples.len());
        let end = range.end.min(self.samples.len());
        AudioBuffer {
            samples: self.samples[start..end].to_vec(),
            sample_rate: self.sample_rate,
        }
    }
}

pub(crate) fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// A half-open time interval `[start, end)` into a source recording, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    start_secs: f64,
    end_secs: f64,
}

impl Segment {
    /// Create a segment, checking `0 <= start < end <= source_duration`.
    pub fn new(start_secs: f64, end_secs: f64, source_duration: f64) -> Result<Self> {
        let valid = start_secs.is_finite()
            && end_secs.is_finite()
            && start_secs >= 0.0
            && start_secs < end_secs
            && end_secs <= source_duration + TIME_EPSILON;
        if !valid {
            return Err(ClipError::InvalidSegment {
                start: start_secs,
                end: end_secs,
                source_duration,
            });
        }
        Ok(Self {
            start_secs,
            end_secs,
        })
    }

    pub fn start_secs(&self) -> f64 {
        self.start_secs
    }

    pub fn end_secs(&self) -> f64 {
        self.end_secs
    }

    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }

    /// Shared duration of the two intervals in seconds (0 when disjoint).
    pub fn overlap_secs(&self, other: &Segment) -> f64 {
        let shared = self.end_secs.min(other.end_secs) - self.start_secs.max(other.start_secs);
        shared.max(0.0)
    }

    /// Sample indices covered by the segment at `sample_rate`.
    pub fn sample_range(&self, sample_rate: u32) -> Range<usize> {
        let rate = sample_rate as f64;
        let start = (self.start_secs * rate).round() as usize;
        let end = (self.end_secs * rate).round() as usize;
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_segments_outside_the_source() {
        assert!(Segment::new(0.0, 8.0, 10.0).is_ok());
        assert!(Segment::new(2.0, 10.0, 10.0).is_ok());
        assert!(Segment::new(-0.5, 3.0, 10.0).is_err());
        assert!(Segment::new(4.0, 4.0, 10.0).is_err());
        assert!(Segment::new(5.0, 3.0, 10.0).is_err());
        assert!(Segment::new(4.0, 10.5, 10.0).is_err());
        assert!(Segment::new(f64::NAN, 1.0, 10.0).is_err());
    }

    #[test]
    fn overlap_is_symmetric_and_zero_when_disjoint() {
        let a = Segment::new(0.0, 8.0, 120.0).unwrap();
        let b = Segment::new(6.0, 14.0, 120.0).unwrap();
        let c = Segment::new(20.0, 28.0, 120.0).unwrap();

        assert_eq!(a.overlap_secs(&b), 2.0);
        assert_eq!(b.overlap_secs(&a), 2.0);
        assert_eq!(a.overlap_secs(&c), 0.0);
        assert_eq!(a.overlap_secs(&a), 8.0);
    }

    #[test]
    fn sample_range_rounds_to_nearest_sample() {
        let seg = Segment::new(0.10004, 0.2, 1.0).unwrap();
        assert_eq!(seg.sample_range(10_000), 1000..2000);

        let seg = Segment::new(0.00006, 0.5, 1.0).unwrap();
        assert_eq!(seg.sample_range(10_000).start, 1);
    }

    #[test]
    fn slice_copies_the_window() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32).collect();
        let buffer = AudioBuffer::from_samples(samples, 10).unwrap();
        let seg = Segment::new(2.0, 5.0, buffer.duration_secs()).unwrap();

        let window = buffer.slice(&seg);
        assert_eq!(window.len(), 30);
        assert_eq!(window.samples()[0], 20.0);
        assert_eq!(window.sample_rate(), 10);
        assert_eq!(buffer.len(), 100);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        assert!(AudioBuffer::from_samples(vec![0.0; 4], 0).is_err());
    }

    #[test]
    fn wav_round_trip_downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(16384i16).unwrap();
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let buffer = AudioBuffer::load_wav(&path).unwrap();
        assert_eq!(buffer.sample_rate(), 8000);
        assert_eq!(buffer.len(), 800);
        assert!((buffer.samples()[0] - 0.25).abs() < 1e-6);
        assert!((buffer.duration_secs() - 0.1).abs() < 1e-9);
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = AudioBuffer::load_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, ClipError::Io(_) | ClipError::Wav(_)));
    }

    #[test]
    fn empty_wav_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[], 16_000).unwrap();

        let err = AudioBuffer::load_wav(&path).unwrap_err();
        assert!(matches!(err, ClipError::EmptyAudio(_)));
    }
}
