//! # refclip-rs
//!
//! Automatic selection of reference clips for voice cloning from one long
//! recording of a speaker.
//!
//! ## Features
//!
//! - **Windowed analysis**: every fixed-length window of the recording is
//!   measured (energy, spectrum, pitch, silence, SNR) and scored
//! - **Transparent scoring**: a weighted average of independent sub-scores
//! - **Non-overlapping selection**: greedy by default, or the exact
//!   maximum-total-score subset
//! - **Clip finishing**: normalization, compression, optional band limiting,
//!   resampling to the conditioning rate and edge fades
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! refclip-rs = "2026.10"
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use refclip_rs::{PipelineConfig, ReferenceClipExtractor};
//!
//! let extractor = ReferenceClipExtractor::new(PipelineConfig::default())?;
//! let report = extractor.extract_to_dir(Path::new("speaker.wav"), Path::new("refs"))?;
//!
//! for path in report.clip_paths() {
//!     println!("{}", path.display());
//! }
//! # Ok::<(), refclip_rs::ClipError>(())
//! ```

pub mod audio;
pub mod candidates;
pub mod config;
pub mod error;
pub mod features;
pub mod finishing;
pub mod pipeline;
pub mod report;
pub mod scoring;
pub mod selection;

#[cfg(test)]
mod testing;

pub use audio::{AudioBuffer, Segment};
pub use candidates::{Candidate, CandidatePool};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{ClipError, Result};
pub use features::{FeatureExtractor, FeatureSet};
pub use finishing::{ClipFinisher, FinishedClip};
pub use pipeline::{Extraction, ReferenceClipExtractor};
pub use report::ExtractionReport;
pub use scoring::{QualityScore, QualityScorer};
pub use selection::{GreedySelector, IntervalSchedulingSelector, SelectionResult, SelectionStrategy};
