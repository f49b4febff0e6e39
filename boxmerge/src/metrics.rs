//! Pairwise similarity metrics between detections
//!
//! Two box metrics are provided: classic intersection-over-union, and
//! intersection-over-smaller-area. The latter targets the patch-seam case
//! where a small object detected in one patch sits entirely inside a larger
//! box detected in an adjacent patch; the union term of IoU is dominated by
//! the larger box and under-reports that subsumption.
//!
//! All metrics return 0.0 for degenerate inputs (zero-area boxes, empty
//! masks) instead of dividing by zero.

use crate::bbox::Bbox;
use crate::suppression::MergeMetric;
use ndarray::prelude::*;
use rayon::prelude::*;

/// Intersection area between two boxes, clamped to zero when disjoint
pub fn intersection_area(a: &Bbox, b: &Bbox) -> f32 {
    let x1 = a.xmin.max(b.xmin);
    let y1 = a.ymin.max(b.ymin);
    let x2 = a.xmax.min(b.xmax);
    let y2 = a.ymax.min(b.ymax);

    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
}

/// Intersection over union
pub fn iou(a: &Bbox, b: &Bbox) -> f32 {
    let intersection = intersection_area(a, b);
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Intersection over the smaller of the two box areas
pub fn ios(a: &Bbox, b: &Bbox) -> f32 {
    let smaller = a.area().min(b.area());
    if smaller <= 0.0 {
        return 0.0;
    }

    intersection_area(a, b) / smaller
}

fn mask_counts(a: ArrayView2<bool>, b: ArrayView2<bool>) -> Option<(usize, usize, usize)> {
    if a.dim() != b.dim() {
        return None;
    }

    let mut intersection = 0usize;
    let mut count_a = 0usize;
    let mut count_b = 0usize;
    for (&pa, &pb) in a.iter().zip(b.iter()) {
        count_a += pa as usize;
        count_b += pb as usize;
        intersection += (pa && pb) as usize;
    }

    Some((intersection, count_a, count_b))
}

/// Intersection over union between two boolean mask rasters
///
/// Masks are expected to share the full-image canvas shape; mismatched
/// shapes or empty masks yield 0.0.
pub fn mask_iou(a: ArrayView2<bool>, b: ArrayView2<bool>) -> f32 {
    match mask_counts(a, b) {
        Some((intersection, count_a, count_b)) => {
            let union = count_a + count_b - intersection;
            if union > 0 {
                intersection as f32 / union as f32
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// Intersection over the smaller of the two mask areas
pub fn mask_ios(a: ArrayView2<bool>, b: ArrayView2<bool>) -> f32 {
    match mask_counts(a, b) {
        Some((intersection, count_a, count_b)) => {
            let smaller = count_a.min(count_b);
            if smaller > 0 {
                intersection as f32 / smaller as f32
            } else {
                0.0
            }
        }
        None => 0.0,
    }
}

/// Compute the pairwise similarity matrix for a set of boxes
///
/// Rows and columns both index `boxes`; the matrix is symmetric with a unit
/// diagonal for non-degenerate boxes. Parallelized over rows.
pub fn similarity_matrix(boxes: &[Bbox], metric: MergeMetric) -> Array2<f32> {
    let n = boxes.len();
    if n == 0 {
        return Array2::zeros((0, 0));
    }

    let data: Vec<f32> = (0..n)
        .into_par_iter()
        .flat_map(|i| {
            (0..n)
                .map(|j| match metric {
                    MergeMetric::Iou => iou(&boxes[i], &boxes[j]),
                    MergeMetric::Ios => ios(&boxes[i], &boxes[j]),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    Array2::from_shape_vec((n, n), data).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_iou_partial_overlap() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(5.0, 5.0, 15.0, 15.0);
        assert_abs_diff_eq!(iou(&a, &b), 25.0 / 175.0, epsilon = 1e-4);
    }

    #[test]
    fn test_iou_disjoint() {
        let a = Bbox::new(0.0, 0.0, 10.0, 10.0);
        let b = Bbox::new(20.0, 20.0, 30.0, 30.0);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(ios(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_vs_ios_subsumed_box() {
        // Small box fully inside a large one: IoU stays low while IoS
        // saturates at 1.0.
        let a = Bbox::new(0.0, 0.0, 100.0, 100.0);
        let b = Bbox::new(10.0, 10.0, 30.0, 30.0);
        assert_abs_diff_eq!(iou(&a, &b), 0.04, epsilon = 1e-4);
        assert_abs_diff_eq!(ios(&a, &b), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_box_similarity_is_zero() {
        let a = Bbox::new(5.0, 5.0, 5.0, 5.0);
        let b = Bbox::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&a, &b), 0.0);
        assert_eq!(ios(&a, &b), 0.0);
    }

    #[test]
    fn test_mask_metrics() {
        let mut a = Array2::from_elem((4, 4), false);
        let mut b = Array2::from_elem((4, 4), false);
        a.slice_mut(ndarray::s![0..2, 0..2]).fill(true); // 4 px
        b.slice_mut(ndarray::s![1..3, 1..3]).fill(true); // 4 px, 1 shared

        assert_abs_diff_eq!(mask_iou(a.view(), b.view()), 1.0 / 7.0, epsilon = 1e-4);
        assert_abs_diff_eq!(mask_ios(a.view(), b.view()), 0.25, epsilon = 1e-4);
    }

    #[test]
    fn test_mask_shape_mismatch_is_zero() {
        let a = Array2::from_elem((4, 4), true);
        let b = Array2::from_elem((3, 3), true);
        assert_eq!(mask_iou(a.view(), b.view()), 0.0);
    }

    #[test]
    fn test_similarity_matrix_symmetry() {
        let boxes = vec![
            Bbox::new(0.0, 0.0, 10.0, 10.0),
            Bbox::new(5.0, 5.0, 15.0, 15.0),
            Bbox::new(100.0, 100.0, 110.0, 110.0),
        ];
        let m = similarity_matrix(&boxes, MergeMetric::Iou);
        assert_eq!(m.dim(), (3, 3));
        assert_abs_diff_eq!(m[[0, 0]], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(m[[0, 1]], m[[1, 0]], epsilon = 1e-6);
        assert_eq!(m[[0, 2]], 0.0);
    }
}
