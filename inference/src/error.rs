//! Error types for the patch-inference pipeline

use thiserror::Error;

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while running patch-based inference
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Invalid overlap, threshold, or metric values; detected eagerly
    /// before any inference runs
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The detector adapter failed on one patch; one failing patch aborts
    /// the run because its detections would otherwise be silently lost
    #[error("Detector adapter failed on patch {patch_index}: {message}")]
    Adapter { patch_index: usize, message: String },

    /// Pixel data preparation failed (decode, resize, crop)
    #[error("Image preprocessing failed: {0}")]
    Preprocessing(String),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn configuration<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn adapter<S: Into<String>>(patch_index: usize, msg: S) -> Self {
        Self::Adapter {
            patch_index,
            message: msg.into(),
        }
    }

    pub fn preprocessing<S: Into<String>>(msg: S) -> Self {
        Self::Preprocessing(msg.into())
    }
}
