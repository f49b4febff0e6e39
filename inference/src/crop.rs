//! Working-image preparation and crop extraction

use crate::error::{PipelineError, Result};
use crate::grid::PatchWindow;
use crate::types::ImageData;
use image::imageops::{self, FilterType};
use image::RgbImage;

/// The image actually gridded: either the source pixels or a resized copy
#[derive(Debug, Clone)]
pub struct WorkingImage {
    pixels: RgbImage,
    scale: f32,
    original_width: u32,
    original_height: u32,
}

impl WorkingImage {
    /// Prepare the working image, resizing the source by `scale` when it
    /// differs from 1.0
    pub fn prepare(source: &ImageData, scale: f32) -> Result<Self> {
        if !scale.is_finite() || scale <= 0.0 {
            return Err(PipelineError::configuration(format!(
                "working scale must be positive, got {scale}"
            )));
        }

        let rgb = source.to_rgb_image()?;
        let pixels = if (scale - 1.0).abs() < f32::EPSILON {
            rgb
        } else {
            let new_width = ((source.width as f32 * scale).round() as u32).max(1);
            let new_height = ((source.height as f32 * scale).round() as u32).max(1);
            log::debug!(
                "resizing {}x{} source to {}x{} working image (scale {scale})",
                source.width,
                source.height,
                new_width,
                new_height
            );
            imageops::resize(&rgb, new_width, new_height, FilterType::Lanczos3)
        };

        Ok(Self {
            pixels,
            scale,
            original_width: source.width,
            original_height: source.height,
        })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn original_size(&self) -> (u32, u32) {
        (self.original_width, self.original_height)
    }

    /// Copy the working pixels out as `ImageData`
    pub fn to_image_data(&self) -> ImageData {
        ImageData::from_rgb_image(self.pixels.clone())
    }
}

/// Materialize the pixels of one patch window by direct indexing
///
/// No padding is added; a clipped final window re-reads pixels that are
/// already inside bounds.
pub fn extract_crop(working: &WorkingImage, window: &PatchWindow) -> ImageData {
    let crop = imageops::crop_imm(
        &working.pixels,
        window.x_start,
        window.y_start,
        window.width(),
        window.height(),
    )
    .to_image();

    ImageData::from_rgb_image(crop)
}
