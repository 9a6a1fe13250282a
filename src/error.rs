use std::path::PathBuf;

use thiserror::Error;

/// Failures of the calibration and pose pipelines.
#[derive(Debug, Error)]
pub enum CalibError {
    #[error("input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("failed to decode image {}: {source}", .path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// Pattern or marker not found in one image. Recoverable per item.
    #[error("detection failed for {}: {reason}", .path.display())]
    DetectionFailure { path: PathBuf, reason: String },

    #[error("insufficient data: {found} valid observation set(s), at least {required} required")]
    InsufficientData { found: usize, required: usize },

    #[error("degenerate configuration: {0}")]
    DegenerateConfiguration(String),

    #[error("invalid calibration pattern: {0}")]
    InvalidPattern(String),

    #[error("invalid camera intrinsics: {0}")]
    InvalidCamera(String),

    #[error("object and image point counts differ ({object} vs {image})")]
    MismatchedCorrespondence { object: usize, image: usize },

    #[error("unknown marker dictionary `{0}`")]
    UnknownDictionary(String),

    #[error("solver failure: {0}")]
    SolverFailure(String),

    #[error("visualization: {0}")]
    Visualization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CalibError>;

impl From<rerun::RecordingStreamError> for CalibError {
    fn from(e: rerun::RecordingStreamError) -> Self {
        CalibError::Visualization(e.to_string())
    }
}
