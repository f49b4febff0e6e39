//! Greedy confidence-ordered duplicate suppression
//!
//! Generalizes non-maximum suppression to the cross-patch case: detections
//! aggregated from overlapping patches are scanned in descending confidence
//! order and every later detection that duplicates a kept one (under the
//! configured metric and threshold) is dropped. Detections are never
//! altered, only selected; the result is a list of indices into the input.

use crate::bbox::Bbox;
use crate::metrics::{iou, ios, mask_iou, mask_ios};
use anyhow::{bail, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Pairwise similarity metric used for duplicate matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergeMetric {
    /// Intersection over union
    #[default]
    Iou,
    /// Intersection over the smaller area; catches a box subsumed by a
    /// larger one from an adjacent patch
    Ios,
}

impl FromStr for MergeMetric {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "iou" => Ok(Self::Iou),
            "ios" => Ok(Self::Ios),
            other => bail!("unknown merge metric '{other}', expected 'iou' or 'ios'"),
        }
    }
}

/// Configuration for the suppression pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Similarity metric used for duplicate matching
    pub metric: MergeMetric,
    /// Similarity threshold; pairs at or above it are duplicates
    pub threshold: f32,
    /// Match duplicates across different classes
    pub class_agnostic: bool,
    /// Use mask-overlap ratios instead of box ratios when both candidates
    /// carry masks
    pub match_on_masks: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            metric: MergeMetric::Iou,
            threshold: 0.5,
            class_agnostic: false,
            match_on_masks: false,
        }
    }
}

impl MergeConfig {
    /// Validate threshold range; intended to run before any inference
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) || !self.threshold.is_finite() {
            bail!(
                "merge threshold must be within [0, 1], got {}",
                self.threshold
            );
        }
        Ok(())
    }
}

/// Borrowed view over one aggregated detection
///
/// `patch_index` is the row-major index of the originating patch window and
/// breaks confidence ties deterministically.
#[derive(Debug, Clone, Copy)]
pub struct MergeCandidate<'a> {
    pub bbox: Bbox,
    pub score: f32,
    pub class_id: u32,
    pub patch_index: usize,
    pub mask: Option<ArrayView2<'a, bool>>,
}

impl<'a> MergeCandidate<'a> {
    pub fn new(bbox: Bbox, score: f32, class_id: u32, patch_index: usize) -> Self {
        Self {
            bbox,
            score,
            class_id,
            patch_index,
            mask: None,
        }
    }

    pub fn with_mask(mut self, mask: ArrayView2<'a, bool>) -> Self {
        self.mask = Some(mask);
        self
    }
}

fn pair_similarity(a: &MergeCandidate, b: &MergeCandidate, config: &MergeConfig) -> f32 {
    if config.match_on_masks {
        if let (Some(ma), Some(mb)) = (a.mask, b.mask) {
            return match config.metric {
                MergeMetric::Iou => mask_iou(ma, mb),
                MergeMetric::Ios => mask_ios(ma, mb),
            };
        }
    }

    match config.metric {
        MergeMetric::Iou => iou(&a.bbox, &b.bbox),
        MergeMetric::Ios => ios(&a.bbox, &b.bbox),
    }
}

/// Run the greedy suppression pass over aggregated detections
///
/// Returns the kept indices into `candidates`, ordered by descending
/// confidence (ties by ascending patch index, then ascending `xmin`). The
/// config is assumed validated; empty input yields an empty list. Running
/// the pass again over its own output is a no-op.
pub fn suppress(candidates: &[MergeCandidate], config: &MergeConfig) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|&a, &b| {
        let ca = &candidates[a];
        let cb = &candidates[b];
        cb.score
            .partial_cmp(&ca.score)
            .unwrap_or(Ordering::Equal)
            .then(ca.patch_index.cmp(&cb.patch_index))
            .then(
                ca.bbox
                    .xmin
                    .partial_cmp(&cb.bbox.xmin)
                    .unwrap_or(Ordering::Equal),
            )
    });

    let mut kept = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..order.len() {
        let idx = order[i];
        if suppressed[idx] {
            continue;
        }

        kept.push(idx);

        for &jdx in &order[i + 1..] {
            if suppressed[jdx] {
                continue;
            }

            let same_class = candidates[idx].class_id == candidates[jdx].class_id;
            if !same_class && !config.class_agnostic {
                continue;
            }

            let similarity = pair_similarity(&candidates[idx], &candidates[jdx], config);
            if similarity >= config.threshold {
                suppressed[jdx] = true;
            }
        }
    }

    kept
}
