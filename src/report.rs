//! Machine-readable record of one extraction run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::features::FeatureSet;
use crate::scoring::SubScores;

/// File name of the JSON report written next to the clips.
pub const REPORT_FILE_NAME: &str = "selection_report.json";

/// One written clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipReport {
    /// 1-based rank in the selection.
    pub rank: usize,
    pub file_name: String,
    pub start_secs: f64,
    pub end_secs: f64,
    pub composite: f32,
    pub sub_scores: SubScores,
    pub features: FeatureSet,
    pub output_duration_secs: f64,
    pub output_peak_dbfs: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub source: PathBuf,
    pub source_duration_secs: f64,
    pub source_sample_rate: u32,
    pub output_dir: PathBuf,
    pub output_sample_rate: u32,
    pub strategy: String,
    pub candidates: usize,
    pub eligible: usize,
    pub requested: usize,
    pub selected: usize,
    pub undersupplied: bool,
    pub clips: Vec<ClipReport>,
}

impl ExtractionReport {
    /// Paths of the written clips, best first.
    pub fn clip_paths(&self) -> Vec<PathBuf> {
        self.clips
            .iter()
            .map(|clip| self.output_dir.join(&clip.file_name))
            .collect()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// `clip_03_q82.wav` for the third clip with a composite of 0.82.
pub fn clip_file_name(rank: usize, composite: f32) -> String {
    format!("clip_{rank:02}_q{:.0}.wav", composite * 100.0)
}

/// True for names produced by [`clip_file_name`].
pub fn is_clip_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_prefix("clip_").and_then(|n| n.strip_suffix(".wav")) else {
        return false;
    };
    let Some((rank, score)) = stem.split_once("_q") else {
        return false;
    };
    !rank.is_empty()
        && !score.is_empty()
        && rank.bytes().all(|b| b.is_ascii_digit())
        && score.bytes().all(|b| b.is_ascii_digit())
}
