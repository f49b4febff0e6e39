//! End-to-end patch-based inference pipeline
//!
//! Working image -> patch grid -> per-patch detector calls -> coordinate
//! remapping -> aggregation -> cross-patch duplicate suppression.

use crate::aggregate::Aggregated;
use crate::crop::{extract_crop, WorkingImage};
use crate::detector::{InferenceParams, PatchDetector};
use crate::error::{PipelineError, Result};
use crate::grid::{generate_grid, GridConfig};
use crate::remap::remap_detection;
use crate::types::{ClassNameResolver, CombinedResult, GlobalDetection, ImageData};
use boxmerge::{suppress, MergeConfig, MergeMetric};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Configuration for one pipeline run
///
/// All fields are named and defaulted; validation runs eagerly before any
/// pixel is touched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatchConfig {
    pub patch_width: u32,
    pub patch_height: u32,
    /// Overlap fractions between adjacent patches, [0, 1)
    pub overlap_x: f32,
    pub overlap_y: f32,
    /// Confidence threshold forwarded to the detector adapter
    pub confidence_threshold: f32,
    /// IoU threshold for the adapter's internal single-patch NMS
    pub iou_threshold: f32,
    /// Request segmentation masks
    pub segment: bool,
    /// Scale applied to the source image before gridding
    pub working_scale: f32,
    /// Report results at the original resolution instead of working-image
    /// coordinates
    pub resize_to_original: bool,
    /// Similarity metric for cross-patch duplicate matching
    pub merge_metric: MergeMetric,
    /// Similarity threshold for duplicate matching, [0, 1]
    pub merge_threshold: f32,
    /// Match duplicates across different classes
    pub class_agnostic: bool,
    /// Match on mask-overlap ratios when both detections carry masks
    pub match_on_masks: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            patch_width: 700,
            patch_height: 700,
            overlap_x: 0.25,
            overlap_y: 0.25,
            confidence_threshold: 0.5,
            iou_threshold: 0.7,
            segment: false,
            working_scale: 1.0,
            resize_to_original: true,
            merge_metric: MergeMetric::Iou,
            merge_threshold: 0.5,
            class_agnostic: false,
            match_on_masks: false,
        }
    }
}

impl PatchConfig {
    pub fn grid_config(&self) -> GridConfig {
        GridConfig {
            patch_width: self.patch_width,
            patch_height: self.patch_height,
            overlap_x: self.overlap_x,
            overlap_y: self.overlap_y,
        }
    }

    pub fn inference_params(&self) -> InferenceParams {
        InferenceParams {
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            segment: self.segment,
        }
    }

    pub fn merge_config(&self) -> MergeConfig {
        MergeConfig {
            metric: self.merge_metric,
            threshold: self.merge_threshold,
            class_agnostic: self.class_agnostic,
            match_on_masks: self.match_on_masks,
        }
    }

    /// Validate every field before the run starts
    pub fn validate(&self) -> Result<()> {
        self.grid_config().validate()?;

        for (name, value) in [
            ("confidence_threshold", self.confidence_threshold),
            ("iou_threshold", self.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) || !value.is_finite() {
                return Err(PipelineError::configuration(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !self.working_scale.is_finite() || self.working_scale <= 0.0 {
            return Err(PipelineError::configuration(format!(
                "working_scale must be positive, got {}",
                self.working_scale
            )));
        }

        self.merge_config()
            .validate()
            .map_err(|e| PipelineError::configuration(e.to_string()))?;

        Ok(())
    }
}

/// Run patch-based inference over one image
///
/// The per-patch loop is parallel; aggregation order follows the patch
/// index regardless of completion order, so results are deterministic for
/// a deterministic adapter. One failing adapter call aborts the whole run;
/// zero detections is a valid empty result.
pub fn run_patched_inference(
    image: &ImageData,
    detector: &dyn PatchDetector,
    resolver: &dyn ClassNameResolver,
    config: &PatchConfig,
) -> Result<CombinedResult> {
    config.validate()?;

    let working = WorkingImage::prepare(image, config.working_scale)?;
    let windows = generate_grid(working.width(), working.height(), &config.grid_config())?;
    log::info!(
        "running '{}' over {} patches of {}x{} ({}x{} working image)",
        detector.name(),
        windows.len(),
        config.patch_width,
        config.patch_height,
        working.width(),
        working.height()
    );

    // The reporting frame: original pixels when rescaling back, the
    // working copy otherwise.
    let (frame, inv_scale) = if config.resize_to_original {
        (image.clone(), 1.0 / working.scale())
    } else {
        (working.to_image_data(), 1.0)
    };
    let (canvas_width, canvas_height) = (frame.width, frame.height);

    let params = config.inference_params();
    let per_patch: Vec<Vec<GlobalDetection>> = windows
        .par_iter()
        .enumerate()
        .map(|(patch_index, window)| {
            let crop = extract_crop(&working, window);
            let raw = detector
                .infer(&crop, &params)
                .map_err(|message| PipelineError::adapter(patch_index, message))?;
            log::debug!("patch {patch_index}: {} raw detections", raw.len());

            Ok(raw
                .into_iter()
                .map(|detection| {
                    remap_detection(
                        detection,
                        window,
                        inv_scale,
                        canvas_width,
                        canvas_height,
                        patch_index,
                    )
                })
                .collect())
        })
        .collect::<Result<_>>()?;

    let aggregated = Aggregated::from_patches(per_patch);
    if aggregated.is_empty() {
        log::info!("no detections in any patch");
        return Ok(CombinedResult::empty(frame));
    }

    let kept = suppress(&aggregated.candidates(), &config.merge_config());
    log::info!(
        "merged {} detections across patches into {}",
        aggregated.len(),
        kept.len()
    );

    let mut result = CombinedResult::empty(frame);
    for &idx in &kept {
        result.boxes.push(aggregated.boxes[idx]);
        result.scores.push(aggregated.scores[idx]);
        result.class_ids.push(aggregated.class_ids[idx]);
        result
            .class_names
            .push(resolver.label(aggregated.class_ids[idx]));
        result.masks.push(aggregated.masks[idx].clone());
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::StubDetector;
    use crate::types::{CocoClasses, RawDetection};
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};

    fn scene(width: u32, height: u32, squares: &[(u32, u32, u32)]) -> ImageData {
        let mut img = RgbImage::from_pixel(width, height, Rgb([10, 10, 10]));
        for &(x0, y0, side) in squares {
            for y in y0..y0 + side {
                for x in x0..x0 + side {
                    img.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
        }
        ImageData::from_rgb_image(img)
    }

    fn seam_config() -> PatchConfig {
        PatchConfig {
            patch_width: 640,
            patch_height: 640,
            overlap_x: 0.1,
            overlap_y: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn test_end_to_end_merges_seam_duplicates() {
        // The bright square sits inside the overlap of the first two
        // patch columns, so two patches report it; merge keeps one.
        let image = scene(1280, 640, &[(600, 300, 20)]);
        let result = run_patched_inference(
            &image,
            &StubDetector::default(),
            &CocoClasses,
            &seam_config(),
        )
        .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result.boxes[0].to_bounds(), [600.0, 300.0, 620.0, 320.0]);
        assert_eq!(result.class_ids[0], 0);
        assert_eq!(result.class_names[0], "person");
        assert_eq!((result.width(), result.height()), (1280, 640));
    }

    #[test]
    fn test_empty_image_yields_empty_result() {
        let image = scene(1280, 640, &[]);
        let result = run_patched_inference(
            &image,
            &StubDetector::default(),
            &CocoClasses,
            &seam_config(),
        )
        .unwrap();
        assert!(result.is_empty());
        assert_eq!((result.width(), result.height()), (1280, 640));
    }

    #[test]
    fn test_resize_to_original_roundtrip() {
        let image = scene(1280, 640, &[(600, 300, 40)]);
        let config = PatchConfig {
            working_scale: 0.5,
            resize_to_original: true,
            ..seam_config()
        };
        let result =
            run_patched_inference(&image, &StubDetector::default(), &CocoClasses, &config)
                .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!((result.width(), result.height()), (1280, 640));
        // Lanczos resampling smears the square edge by a pixel or two in
        // working space, doubled on the way back.
        let bounds = result.boxes[0].to_bounds();
        let expected = [600.0, 300.0, 640.0, 340.0];
        for (got, want) in bounds.iter().zip(&expected) {
            assert_abs_diff_eq!(*got, *want, epsilon = 4.0);
        }
    }

    #[test]
    fn test_segmentation_masks_carried() {
        let image = scene(1280, 640, &[(600, 300, 20)]);
        let config = PatchConfig {
            segment: true,
            ..seam_config()
        };
        let result =
            run_patched_inference(&image, &StubDetector::default(), &CocoClasses, &config)
                .unwrap();

        assert_eq!(result.len(), 1);
        let mask = result.masks[0].as_ref().unwrap();
        assert_eq!(mask.dim(), (640, 1280));
        assert_eq!(mask.iter().filter(|&&p| p).count(), 400);
        assert!(mask[[300, 600]]);
    }

    #[test]
    fn test_pipeline_is_deterministic() {
        let image = scene(1280, 640, &[(100, 100, 16), (600, 300, 20), (1200, 500, 12)]);
        let first = run_patched_inference(
            &image,
            &StubDetector::default(),
            &CocoClasses,
            &seam_config(),
        )
        .unwrap();
        let second = run_patched_inference(
            &image,
            &StubDetector::default(),
            &CocoClasses,
            &seam_config(),
        )
        .unwrap();

        assert_eq!(first.boxes, second.boxes);
        assert_eq!(first.scores, second.scores);
        assert_eq!(first.class_ids, second.class_ids);
    }

    struct FailingDetector;

    impl PatchDetector for FailingDetector {
        fn infer(
            &self,
            _crop: &ImageData,
            _params: &InferenceParams,
        ) -> std::result::Result<Vec<RawDetection>, String> {
            Err("backend unavailable".to_string())
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[test]
    fn test_adapter_failure_aborts_run() {
        let image = scene(1280, 640, &[(600, 300, 20)]);
        let err = run_patched_inference(&image, &FailingDetector, &CocoClasses, &seam_config())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Adapter { .. }));
    }

    #[test]
    fn test_invalid_config_rejected_before_inference() {
        let image = scene(64, 64, &[]);
        let config = PatchConfig {
            merge_threshold: 1.5,
            ..Default::default()
        };
        // FailingDetector would abort with an Adapter error if the run got
        // past validation.
        let err =
            run_patched_inference(&image, &FailingDetector, &CocoClasses, &config).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
