//! Patch grid generation with configurable overlap
//!
//! Splits the working image into an ordered sequence of patch windows that
//! cover it without gaps. Adjacent windows overlap by a rounded fraction of
//! the patch size; when an axis is not evenly tiled, one final edge-aligned
//! window closes the gap instead of leaving a ragged uncovered strip.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// One patch window in working-image pixel coordinates, end-exclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchWindow {
    pub x_start: u32,
    pub y_start: u32,
    pub x_end: u32,
    pub y_end: u32,
}

impl PatchWindow {
    pub fn width(&self) -> u32 {
        self.x_end - self.x_start
    }

    pub fn height(&self) -> u32 {
        self.y_end - self.y_start
    }
}

/// Patch shape and overlap fractions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub patch_width: u32,
    pub patch_height: u32,
    /// Fraction of the patch width shared with the horizontal neighbor, [0, 1)
    pub overlap_x: f32,
    /// Fraction of the patch height shared with the vertical neighbor, [0, 1)
    pub overlap_y: f32,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            patch_width: 700,
            patch_height: 700,
            overlap_x: 0.25,
            overlap_y: 0.25,
        }
    }
}

impl GridConfig {
    /// Validate patch shape and overlap fractions eagerly
    pub fn validate(&self) -> Result<()> {
        if self.patch_width == 0 || self.patch_height == 0 {
            return Err(PipelineError::configuration(format!(
                "patch size must be positive, got {}x{}",
                self.patch_width, self.patch_height
            )));
        }
        for (axis, overlap) in [("x", self.overlap_x), ("y", self.overlap_y)] {
            if !(0.0..1.0).contains(&overlap) || !overlap.is_finite() {
                return Err(PipelineError::configuration(format!(
                    "overlap_{axis} must be within [0, 1), got {overlap}"
                )));
            }
        }
        // Rounding can still consume the whole patch for overlaps close to 1.
        step(self.patch_width, self.overlap_x)?;
        step(self.patch_height, self.overlap_y)?;
        Ok(())
    }
}

/// Stride between window starts along one axis
fn step(patch: u32, overlap: f32) -> Result<u32> {
    let overlap_px = (patch as f32 * overlap).round() as u32;
    if overlap_px >= patch {
        return Err(PipelineError::configuration(format!(
            "overlap {overlap} leaves no stride for patch size {patch}"
        )));
    }
    Ok(patch - overlap_px)
}

/// Window start/end pairs along one axis
fn axis_windows(extent: u32, patch: u32, overlap: f32) -> Result<Vec<(u32, u32)>> {
    // Patch larger than the axis degrades to a single full-axis window.
    if extent <= patch {
        return Ok(vec![(0, extent)]);
    }

    let stride = step(patch, overlap)?;
    let mut windows = Vec::new();
    let mut start = 0u32;
    while start + patch <= extent {
        windows.push((start, start + patch));
        start += stride;
    }

    // Close the uncovered strip with one edge-aligned window.
    if windows.last().map(|&(_, end)| end) != Some(extent) {
        windows.push((extent - patch, extent));
    }

    Ok(windows)
}

/// Generate the row-major patch grid covering a working image
///
/// The position of a window in the returned sequence is its stable patch
/// index, used downstream for tie-breaking during suppression.
pub fn generate_grid(width: u32, height: u32, config: &GridConfig) -> Result<Vec<PatchWindow>> {
    if width == 0 || height == 0 {
        return Err(PipelineError::configuration(format!(
            "image dimensions must be positive, got {width}x{height}"
        )));
    }
    config.validate()?;

    let x_windows = axis_windows(width, config.patch_width, config.overlap_x)?;
    let y_windows = axis_windows(height, config.patch_height, config.overlap_y)?;

    let mut grid = Vec::with_capacity(x_windows.len() * y_windows.len());
    for &(y_start, y_end) in &y_windows {
        for &(x_start, x_end) in &x_windows {
            grid.push(PatchWindow {
                x_start,
                y_start,
                x_end,
                y_end,
            });
        }
    }

    log::debug!(
        "generated {}x{} patch grid ({} windows) for {}x{} image",
        x_windows.len(),
        y_windows.len(),
        grid.len(),
        width,
        height
    );

    Ok(grid)
}
