//! Patch-Based Detection Inference Library
//!
//! Runs object detection/segmentation over large images by splitting them
//! into overlapping patches, invoking a detector on each patch, remapping
//! per-patch results into full-image coordinates, and merging the combined
//! set with cross-patch duplicate suppression. Recovers small objects a
//! single downscaled whole-image pass would miss, without duplicating
//! detections along patch seams.
//!
//! The detection model itself is an external collaborator behind the
//! [`PatchDetector`] trait; this crate owns the tiling and merge pipeline
//! only.

pub mod aggregate;
pub mod crop;
pub mod detector;
pub mod error;
pub mod grid;
pub mod pipeline;
pub mod remap;
pub mod types;

pub use aggregate::Aggregated;
pub use crop::{extract_crop, WorkingImage};
pub use detector::{InferenceParams, PatchDetector, StubDetector};
pub use error::{PipelineError, Result};
pub use grid::{generate_grid, GridConfig, PatchWindow};
pub use pipeline::{run_patched_inference, PatchConfig};
pub use types::{
    ClassNameResolver, CocoClasses, CombinedResult, GlobalDetection, ImageData, ImageFormat,
    RawDetection,
};

// Re-export the merge core so callers can run suppression standalone.
pub use boxmerge::{Bbox, MergeConfig, MergeMetric};

/// Get library version information
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
