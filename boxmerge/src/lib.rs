//! Cross-patch duplicate suppression for tiled detection inference
//!
//! This crate provides the pure-algorithmic core used after patch-based
//! inference: bounding-box geometry, pairwise similarity metrics (IoU and
//! intersection-over-smaller-area), and a greedy confidence-ordered
//! suppression pass that consolidates duplicate detections produced by
//! overlapping patches.
//!
//! ```rust,ignore
//! use boxmerge::{Bbox, MergeCandidate, MergeConfig, suppress};
//!
//! let candidates = vec![
//!     MergeCandidate::new(Bbox::new(0.0, 0.0, 100.0, 100.0), 0.9, 0, 0),
//!     MergeCandidate::new(Bbox::new(10.0, 10.0, 30.0, 30.0), 0.8, 0, 1),
//! ];
//! let kept = suppress(&candidates, &MergeConfig::default());
//! ```

pub mod bbox;
pub mod metrics;
pub mod suppression;

pub use bbox::Bbox;
pub use metrics::{intersection_area, iou, ios, mask_iou, mask_ios, similarity_matrix};
pub use suppression::{suppress, MergeCandidate, MergeConfig, MergeMetric};
