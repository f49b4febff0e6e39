//! Detector adapter interface and the in-tree stub detector
//!
//! The detection model is an external collaborator: one call per patch,
//! patch pixels in, patch-local detections out. The adapter runs its own
//! NMS inside a single patch; this pipeline only deduplicates across
//! patches.

use crate::types::{ImageData, RawDetection};
use boxmerge::Bbox;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-call inference parameters forwarded to the adapter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceParams {
    /// Confidence threshold for the detector's own filtering
    pub confidence_threshold: f32,
    /// IoU threshold for the detector's internal single-patch NMS
    pub iou_threshold: f32,
    /// Request segmentation masks alongside boxes
    pub segment: bool,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.7,
            segment: false,
        }
    }
}

/// Common interface for per-patch object detectors
///
/// Implementations must be deterministic for identical inputs; the
/// per-patch loop runs them in parallel, hence `Send + Sync`.
pub trait PatchDetector: Send + Sync {
    /// Detect objects in a single crop, in crop-local coordinates
    fn infer(
        &self,
        crop: &ImageData,
        params: &InferenceParams,
    ) -> std::result::Result<Vec<RawDetection>, String>;

    /// Detector name for logging
    fn name(&self) -> &str;
}

/// Deterministic luminance-threshold detector used by tests and demos
///
/// Reports the bounding box of all pixels brighter than `luma_threshold`
/// as a single class-0 object with a fixed score. Stands in for a real
/// model backend without pulling in a runtime.
#[derive(Debug, Clone, Copy)]
pub struct StubDetector {
    pub luma_threshold: u8,
    pub score: f32,
    pub class_id: u32,
}

impl Default for StubDetector {
    fn default() -> Self {
        Self {
            luma_threshold: 200,
            score: 0.9,
            class_id: 0,
        }
    }
}

impl PatchDetector for StubDetector {
    fn infer(
        &self,
        crop: &ImageData,
        params: &InferenceParams,
    ) -> std::result::Result<Vec<RawDetection>, String> {
        if self.score < params.confidence_threshold {
            return Ok(Vec::new());
        }

        let rgb = crop.to_rgb_image().map_err(|e| e.to_string())?;
        let bright = |x: u32, y: u32| {
            let [r, g, b] = rgb.get_pixel(x, y).0;
            let luma = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
            luma > self.luma_threshold as f32
        };

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for y in 0..crop.height {
            for x in 0..crop.width {
                if bright(x, y) {
                    bounds = Some(match bounds {
                        None => (x, y, x, y),
                        Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
                    });
                }
            }
        }

        let Some((x0, y0, x1, y1)) = bounds else {
            return Ok(Vec::new());
        };

        let bbox = Bbox::new(x0 as f32, y0 as f32, (x1 + 1) as f32, (y1 + 1) as f32);
        let mut detection = RawDetection::new(bbox, self.score, self.class_id);

        if params.segment {
            let mask = Array2::from_shape_fn(
                (crop.height as usize, crop.width as usize),
                |(row, col)| bright(col as u32, row as u32),
            );
            detection = detection.with_mask(mask);
        }

        Ok(vec![detection])
    }

    fn name(&self) -> &str {
        "luma-threshold-stub"
    }
}
