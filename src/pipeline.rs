//! End-to-end reference clip extraction.
//!
//! [`ReferenceClipExtractor`] wires the stages together: sliding-window
//! candidates, selection, finishing, and optionally writing the clips and a
//! JSON report to disk.

use std::fs;
use std::path::Path;

use crate::audio::AudioBuffer;
use crate::candidates::{CandidateGenerator, CandidatePool};
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::finishing::{ClipFinisher, FinishedClip};
use crate::report::{clip_file_name, is_clip_file_name, ClipReport, ExtractionReport, REPORT_FILE_NAME};
use crate::scoring::QualityScorer;
use crate::selection::{GreedySelector, SelectionResult, SelectionStrategy};

/// Everything one in-memory run produced.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub pool: CandidatePool,
    pub selection: SelectionResult,
    /// Finished clips in selection order.
    pub clips: Vec<FinishedClip>,
}

pub struct ReferenceClipExtractor {
    config: PipelineConfig,
    extractor: FeatureExtractor,
    scorer: QualityScorer,
    finisher: ClipFinisher,
    strategy: Box<dyn SelectionStrategy>,
}

impl ReferenceClipExtractor {
    /// Validate `config` and build every stage. Uses greedy selection.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: FeatureExtractor::new(config.features.clone())?,
            scorer: QualityScorer::new(config.scoring.clone()),
            finisher: ClipFinisher::new(config.finishing.clone())?,
            strategy: Box::new(GreedySelector),
            config,
        })
    }

    /// Replace the selection strategy.
    pub fn with_strategy<S: SelectionStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Box::new(strategy);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Score every window of `audio`.
    pub fn analyze(&self, audio: &AudioBuffer) -> CandidatePool {
        CandidateGenerator::new(&self.config.window, &self.extractor, &self.scorer).generate(audio)
    }

    pub fn select(&self, pool: &CandidatePool) -> SelectionResult {
        self.strategy.select(pool, &self.config.selection)
    }

    pub fn finish(&self, audio: &AudioBuffer, selection: &SelectionResult) -> Result<Vec<FinishedClip>> {
        self.finisher.finish_all(audio, selection)
    }

    pub fn run(&self, audio: &AudioBuffer) -> Result<Extraction> {
        let pool = self.analyze(audio);
        let selection = self.select(&pool);
        let clips = self.finish(audio, &selection)?;
        Ok(Extraction {
            pool,
            selection,
            clips,
        })
    }

    /// Load `input`, extract clips and write them plus a report to `output_dir`.
    ///
    /// Nothing is written unless loading and processing succeed. Clip files
    /// left in `output_dir` by an earlier run are removed first; other files
    /// are not touched.
    pub fn extract_to_dir(&self, input: &Path, output_dir: &Path) -> Result<ExtractionReport> {
        let audio = AudioBuffer::load_wav(input)?;
        let extraction = self.run(&audio)?;

        fs::create_dir_all(output_dir)?;
        remove_stale_clips(output_dir)?;

        let mut clips = Vec::with_capacity(extraction.clips.len());
        for (i, (clip, candidate)) in extraction
            .clips
            .iter()
            .zip(&extraction.selection.selected)
            .enumerate()
        {
            let rank = i + 1;
            let file_name = clip_file_name(rank, clip.composite);
            let path = output_dir.join(&file_name);
            clip.write_wav(&path)?;
            log::info!(
                "Wrote {} ({:.1}s-{:.1}s, Q={:.1})",
                path.display(),
                clip.segment.start_secs(),
                clip.segment.end_secs(),
                candidate.score.as_percent()
            );

            clips.push(ClipReport {
                rank,
                file_name,
                start_secs: clip.segment.start_secs(),
                end_secs: clip.segment.end_secs(),
                composite: clip.composite,
                sub_scores: candidate.score.sub_scores.clone(),
                features: candidate.score.features.clone(),
                output_duration_secs: clip.duration_secs(),
                output_peak_dbfs: clip.peak_dbfs(),
            });
        }

        let selection = &extraction.selection;
        let report = ExtractionReport {
            source: input.to_path_buf(),
            source_duration_secs: audio.duration_secs(),
            source_sample_rate: audio.sample_rate(),
            output_dir: output_dir.to_path_buf(),
            output_sample_rate: self.config.finishing.output_sample_rate,
            strategy: self.strategy.name().to_string(),
            candidates: selection.considered,
            eligible: selection.eligible,
            requested: selection.requested,
            selected: selection.len(),
            undersupplied: selection.is_undersupplied(),
            clips,
        };
        report.write_json(&output_dir.join(REPORT_FILE_NAME))?;

        Ok(report)
    }
}

fn remove_stale_clips(output_dir: &Path) -> Result<()> {
    for entry in fs::read_dir(output_dir)? {
        let entry = entry?;
        let is_clip = entry
            .file_name()
            .to_str()
            .map_or(false, is_clip_file_name);
        if is_clip && entry.file_type()?.is_file() {
            log::debug!("Removing stale clip {}", entry.path().display());
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use crate::config::{PipelineConfigBuilder, SelectionConfig, WindowConfig};
    use crate::error::ClipError;
    use crate::selection::IntervalSchedulingSelector;
    use crate::testing::speech_like;
    use std::path::PathBuf;

    fn open_floors(clip_count: usize) -> PipelineConfig {
        PipelineConfigBuilder::default()
            .selection(SelectionConfig {
                clip_count,
                min_quality: 0.0,
                min_snr_db: 0.0,
                ..Default::default()
            })
            .build()
            .unwrap()
    }

    #[test]
    fn two_minutes_of_speech_give_five_clips() {
        let sr = 16_000;
        let audio = AudioBuffer::from_samples(speech_like(sr, 120.0, 11), sr).unwrap();
        let extractor = ReferenceClipExtractor::new(open_floors(5)).unwrap();
        let run = extractor.run(&audio).unwrap();

        assert_eq!(run.pool.len(), 19);
        assert_eq!(run.selection.len(), 5);
        assert!(!run.selection.is_undersupplied());
        assert_eq!(run.clips.len(), 5);

        let selected = &run.selection.selected;
        for (i, a) in selected.iter().enumerate() {
            for b in &selected[i + 1..] {
                assert!(a.segment.overlap_secs(&b.segment) <= 2.0 + 1e-9);
                assert!(a.score.composite >= b.score.composite);
            }
        }
        for clip in &run.clips {
            assert_eq!(clip.sample_rate, 24_000);
            assert_eq!(clip.samples.len(), 8 * 24_000);
            assert!(clip.peak_dbfs() <= 0.0);
        }
    }

    #[test]
    fn runs_are_deterministic() {
        let sr = 8_000;
        let audio = AudioBuffer::from_samples(speech_like(sr, 40.0, 5), sr).unwrap();
        let extractor = ReferenceClipExtractor::new(open_floors(3)).unwrap();
        let first = extractor.run(&audio).unwrap();
        let second = extractor.run(&audio).unwrap();
        assert_eq!(first.selection, second.selection);
        assert_eq!(first.clips, second.clips);
    }

    #[test]
    fn silent_recording_is_undersupplied() {
        let sr = 16_000;
        let audio = AudioBuffer::from_samples(vec![0.0; 30 * sr as usize], sr).unwrap();
        let extractor = ReferenceClipExtractor::new(PipelineConfig::default()).unwrap();
        let run = extractor.run(&audio).unwrap();

        assert_eq!(run.pool.len(), 4);
        assert!(run.selection.is_empty());
        assert!(run.selection.is_undersupplied());
        assert_eq!(run.selection.shortfall(), 5);
        assert!(run.clips.is_empty());
    }

    #[test]
    fn invalid_config_is_rejected_up_front() {
        let config = PipelineConfigBuilder::default()
            .window(WindowConfig {
                window_secs: 4.0,
                overlap_secs: 4.0,
                ..Default::default()
            })
            .build()
            .unwrap();
        assert!(matches!(
            ReferenceClipExtractor::new(config),
            Err(ClipError::Config(_))
        ));
    }

    #[test]
    fn missing_input_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("refs");
        let extractor = ReferenceClipExtractor::new(PipelineConfig::default()).unwrap();

        let err = extractor
            .extract_to_dir(&dir.path().join("missing.wav"), &out)
            .unwrap_err();
        assert!(matches!(err, ClipError::Io(_)));
        assert!(!out.exists());
    }

    #[test]
    fn extracts_clips_and_report_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("source.wav");
        let out = dir.path().join("refs");
        let sr = 16_000;
        write_wav(&input, &speech_like(sr, 30.0, 9), sr).unwrap();

        let extractor = ReferenceClipExtractor::new(open_floors(2))
            .unwrap()
            .with_strategy(IntervalSchedulingSelector);
        let report = extractor.extract_to_dir(&input, &out).unwrap();

        assert_eq!(report.strategy, "interval-scheduling");
        assert_eq!(report.candidates, 4);
        assert_eq!(report.selected, 2);
        assert!(!report.undersupplied);

        let paths = report.clip_paths();
        assert_eq!(paths.len(), 2);
        for (path, clip) in paths.iter().zip(&report.clips) {
            assert!(clip.file_name.starts_with(&format!("clip_{:02}_q", clip.rank)));
            let written = AudioBuffer::load_wav(path).unwrap();
            assert_eq!(written.sample_rate(), 24_000);
            assert_eq!(written.len(), 8 * 24_000);
        }

        let saved = ExtractionReport::from_json_file(&out.join(REPORT_FILE_NAME)).unwrap();
        assert_eq!(saved, report);
    }

    #[test]
    fn rerun_replaces_clips_from_a_larger_run() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("source.wav");
        let out = dir.path().join("refs");
        let sr = 8_000;
        write_wav(&input, &speech_like(sr, 30.0, 3), sr).unwrap();

        ReferenceClipExtractor::new(open_floors(4))
            .unwrap()
            .extract_to_dir(&input, &out)
            .unwrap();
        std::fs::write(out.join("notes.txt"), "keep me").unwrap();

        let report = ReferenceClipExtractor::new(open_floors(1))
            .unwrap()
            .extract_to_dir(&input, &out)
            .unwrap();

        let mut wavs: Vec<PathBuf> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().map_or(false, |ext| ext == "wav"))
            .collect();
        wavs.sort();
        assert_eq!(wavs, report.clip_paths());
        assert!(out.join("notes.txt").exists());
    }
}
