//! Aggregation of remapped detections into flat parallel arrays
//!
//! Pure concatenation in patch-index order; all semantic merging happens in
//! the suppression pass.

use crate::types::GlobalDetection;
use boxmerge::{Bbox, MergeCandidate};
use ndarray::Array2;

/// All remapped detections from all patches, as parallel arrays
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub boxes: Vec<Bbox>,
    pub scores: Vec<f32>,
    pub class_ids: Vec<u32>,
    pub masks: Vec<Option<Array2<bool>>>,
    pub patch_indices: Vec<usize>,
}

impl Aggregated {
    /// Concatenate per-patch detection lists, given in patch-index order
    pub fn from_patches(per_patch: Vec<Vec<GlobalDetection>>) -> Self {
        let total = per_patch.iter().map(Vec::len).sum();
        let mut aggregated = Self {
            boxes: Vec::with_capacity(total),
            scores: Vec::with_capacity(total),
            class_ids: Vec::with_capacity(total),
            masks: Vec::with_capacity(total),
            patch_indices: Vec::with_capacity(total),
        };

        for detections in per_patch {
            for detection in detections {
                aggregated.boxes.push(detection.bbox);
                aggregated.scores.push(detection.score);
                aggregated.class_ids.push(detection.class_id);
                aggregated.masks.push(detection.mask);
                aggregated.patch_indices.push(detection.patch_index);
            }
        }

        aggregated
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Borrowed candidate view for the suppression engine
    pub fn candidates(&self) -> Vec<MergeCandidate<'_>> {
        (0..self.len())
            .map(|i| {
                let mut candidate = MergeCandidate::new(
                    self.boxes[i],
                    self.scores[i],
                    self.class_ids[i],
                    self.patch_indices[i],
                );
                if let Some(mask) = &self.masks[i] {
                    candidate = candidate.with_mask(mask.view());
                }
                candidate
            })
            .collect()
    }
}
