use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ClipError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Audio file '{}' contains no samples", .0.display())]
    EmptyAudio(PathBuf),
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Invalid segment [{start:.3}s, {end:.3}s) for a source of {source_duration:.3}s")]
    InvalidSegment {
        start: f64,
        end: f64,
        source_duration: f64,
    },
    #[error("Resampling failed: {0}")]
    Resample(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<derive_builder::UninitializedFieldError> for ClipError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        ClipError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClipError>;
