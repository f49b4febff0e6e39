//! Coordinate remapping from patch-local to full-image space
//!
//! Boxes are translated by the patch offset and, when the pipeline resized
//! the image before gridding, mapped back to the native resolution by the
//! inverse scale. Masks are rescaled the same way and blitted into a
//! zero-initialized full-canvas raster.

use crate::grid::PatchWindow;
use crate::types::{GlobalDetection, RawDetection};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use ndarray::Array2;

/// Remap one raw detection into the full-image frame
///
/// `inv_scale` is 1/working-scale when results are reported at the original
/// resolution, 1.0 otherwise. `canvas_width`/`canvas_height` are the
/// dimensions of that reporting frame.
pub fn remap_detection(
    raw: RawDetection,
    window: &PatchWindow,
    inv_scale: f32,
    canvas_width: u32,
    canvas_height: u32,
    patch_index: usize,
) -> GlobalDetection {
    let translated = raw
        .bbox
        .translate(window.x_start as f32, window.y_start as f32);
    let bbox = if (inv_scale - 1.0).abs() < f32::EPSILON {
        translated
    } else {
        let scaled = translated.scale(inv_scale);
        boxmerge::Bbox::new(
            scaled.xmin.round(),
            scaled.ymin.round(),
            scaled.xmax.round(),
            scaled.ymax.round(),
        )
    };

    let mask = raw
        .mask
        .map(|m| place_mask(&m, window, inv_scale, canvas_width, canvas_height));

    GlobalDetection {
        bbox,
        score: raw.score,
        class_id: raw.class_id,
        mask,
        patch_index,
    }
}

/// Place a patch-local mask raster into a full-canvas raster
///
/// Fragments falling outside the canvas are clipped; they should not occur
/// for in-bounds windows but a resized final window can round past the edge
/// by a pixel.
fn place_mask(
    mask: &Array2<bool>,
    window: &PatchWindow,
    inv_scale: f32,
    canvas_width: u32,
    canvas_height: u32,
) -> Array2<bool> {
    let mut canvas = Array2::from_elem((canvas_height as usize, canvas_width as usize), false);

    let (local, offset_x, offset_y) = if (inv_scale - 1.0).abs() < f32::EPSILON {
        (mask.clone(), window.x_start as usize, window.y_start as usize)
    } else {
        let target_w = ((mask.ncols() as f32 * inv_scale).round() as u32).max(1);
        let target_h = ((mask.nrows() as f32 * inv_scale).round() as u32).max(1);
        (
            rescale_mask(mask, target_w, target_h),
            (window.x_start as f32 * inv_scale).round() as usize,
            (window.y_start as f32 * inv_scale).round() as usize,
        )
    };

    for ((row, col), &set) in local.indexed_iter() {
        if !set {
            continue;
        }
        let y = offset_y + row;
        let x = offset_x + col;
        if y < canvas.nrows() && x < canvas.ncols() {
            canvas[[y, x]] = true;
        }
    }

    canvas
}

/// Nearest-neighbor rescale of a boolean raster through a luma buffer
fn rescale_mask(mask: &Array2<bool>, target_width: u32, target_height: u32) -> Array2<bool> {
    let gray = GrayImage::from_fn(mask.ncols() as u32, mask.nrows() as u32, |x, y| {
        Luma([if mask[[y as usize, x as usize]] { 255 } else { 0 }])
    });
    let resized = imageops::resize(&gray, target_width, target_height, FilterType::Nearest);

    Array2::from_shape_fn(
        (target_height as usize, target_width as usize),
        |(row, col)| resized.get_pixel(col as u32, row as u32).0[0] > 127,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxmerge::Bbox;

    fn window(x_start: u32, y_start: u32, size: u32) -> PatchWindow {
        PatchWindow {
            x_start,
            y_start,
            x_end: x_start + size,
            y_end: y_start + size,
        }
    }

    #[test]
    fn test_box_translation() {
        let raw = RawDetection::new(Bbox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let out = remap_detection(raw, &window(100, 50, 640), 1.0, 1280, 720, 3);
        assert_eq!(out.bbox.to_bounds(), [100.0, 50.0, 110.0, 60.0]);
        assert_eq!(out.patch_index, 3);
    }

    #[test]
    fn test_box_rescaled_to_original_resolution() {
        // Working scale 0.5 before gridding, so coordinates double on the
        // way back out.
        let raw = RawDetection::new(Bbox::new(0.0, 0.0, 10.0, 10.0), 0.9, 0);
        let out = remap_detection(raw, &window(100, 50, 640), 2.0, 2560, 1440, 0);
        assert_eq!(out.bbox.to_bounds(), [200.0, 100.0, 220.0, 120.0]);
    }

    #[test]
    fn test_mask_placed_on_canvas() {
        let mut mask = Array2::from_elem((8, 8), false);
        mask[[0, 0]] = true;
        mask[[7, 7]] = true;

        let raw = RawDetection::new(Bbox::new(0.0, 0.0, 8.0, 8.0), 0.9, 0).with_mask(mask);
        let out = remap_detection(raw, &window(10, 20, 8), 1.0, 64, 64, 0);

        let canvas = out.mask.unwrap();
        assert_eq!(canvas.dim(), (64, 64));
        assert!(canvas[[20, 10]]);
        assert!(canvas[[27, 17]]);
        assert_eq!(canvas.iter().filter(|&&p| p).count(), 2);
    }

    #[test]
    fn test_mask_rescaled_with_inverse_scale() {
        let mut mask = Array2::from_elem((4, 4), false);
        mask[[0, 0]] = true;

        let raw = RawDetection::new(Bbox::new(0.0, 0.0, 4.0, 4.0), 0.9, 0).with_mask(mask);
        let out = remap_detection(raw, &window(4, 4, 4), 2.0, 32, 32, 0);

        // The single set pixel becomes a 2x2 block at the doubled offset.
        let canvas = out.mask.unwrap();
        assert!(canvas[[8, 8]]);
        assert!(canvas[[9, 9]]);
        assert_eq!(canvas.iter().filter(|&&p| p).count(), 4);
    }

    #[test]
    fn test_out_of_canvas_mask_fragment_clipped() {
        let mask = Array2::from_elem((8, 8), true);
        let raw = RawDetection::new(Bbox::new(0.0, 0.0, 8.0, 8.0), 0.9, 0).with_mask(mask);
        // Window extends past the small canvas.
        let out = remap_detection(raw, &window(12, 12, 8), 1.0, 16, 16, 0);

        let canvas = out.mask.unwrap();
        assert_eq!(canvas.iter().filter(|&&p| p).count(), 16);
    }
}
