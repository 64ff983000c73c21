//! Crown outlines, filled crown mask and isolated-pixel repair.
//!
//! Outline pixels stay zero in the final mask, so every crown keeps a
//! one-pixel ring that separates it from its neighbours.

use crate::contours::{find_contours, BBox, Contour};
use crate::raster::Raster;
use crate::segmentation::NEIGHBORS_4;
use log::debug;
use std::collections::{BTreeMap, VecDeque};

/// Foreground value of the final mask.
pub const FOREGROUND: u8 = 255;

// ---------------------------------------------------------------------------
// Public result types
// ---------------------------------------------------------------------------

/// Traced outline of one crown.
#[derive(Debug, Clone)]
pub struct CrownOutline {
    pub label: u32,
    /// Pixel count of the crown in the label map.
    pub area_px: usize,
    /// Mean (row, col) of the crown pixels.
    pub centroid: (f64, f64),
    /// Inclusive pixel bounding box.
    pub bbox: BBox,
    pub contours: Vec<Contour>,
}

/// Products of [`extract_boundaries`].
#[derive(Debug, Clone)]
pub struct BoundaryExtraction {
    /// Rasterized outline pixels of all crowns.
    pub boundary: Raster<bool>,
    /// Outlines with their enclosed interiors filled.
    pub filled: Raster<bool>,
    /// `filled` minus `boundary`, repaired; values 0 or 255.
    pub final_mask: Raster<u8>,
    pub outlines: Vec<CrownOutline>,
    /// Pixels flipped by the isolated-pixel repair.
    pub patched: usize,
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LabelStats {
    area: usize,
    sum_r: f64,
    sum_c: f64,
    bbox: BBox,
}

fn label_stats(labels: &Raster<u32>) -> BTreeMap<u32, LabelStats> {
    let mut stats: BTreeMap<u32, LabelStats> = BTreeMap::new();
    for r in 0..labels.nrow {
        for c in 0..labels.ncol {
            let id = labels.get(r, c);
            if id == 0 {
                continue;
            }
            let s = stats.entry(id).or_insert(LabelStats {
                area: 0,
                sum_r: 0.0,
                sum_c: 0.0,
                bbox: (r, r, c, c),
            });
            s.area += 1;
            s.sum_r += r as f64;
            s.sum_c += c as f64;
            s.bbox.0 = s.bbox.0.min(r);
            s.bbox.1 = s.bbox.1.max(r);
            s.bbox.2 = s.bbox.2.min(c);
            s.bbox.3 = s.bbox.3.max(c);
        }
    }
    stats
}

/// Trace the 0.5 isocontours of every non-zero label's own submask.
pub fn trace_outlines(labels: &Raster<u32>) -> Vec<CrownOutline> {
    let (nrow, ncol) = labels.shape();
    label_stats(labels)
        .into_iter()
        .map(|(label, s)| CrownOutline {
            label,
            area_px: s.area,
            centroid: (s.sum_r / s.area as f64, s.sum_c / s.area as f64),
            bbox: s.bbox,
            contours: find_contours(nrow, ncol, s.bbox, |r, c| labels.get(r, c) == label),
        })
        .collect()
}

/// Round contour vertices to the nearest pixel (ties to even) and mark them.
pub fn rasterize_outlines(nrow: usize, ncol: usize, outlines: &[CrownOutline]) -> Raster<bool> {
    let mut boundary = Raster::new(nrow, ncol, false);
    if boundary.is_empty() {
        return boundary;
    }
    let clip = |v: f64, n: usize| (v.round_ties_even().max(0.0) as usize).min(n - 1);
    for contour in outlines.iter().flat_map(|o| o.contours.iter()) {
        for &(r, c) in &contour.points {
            boundary.set(clip(r, nrow), clip(c, ncol), true);
        }
    }
    boundary
}

// ---------------------------------------------------------------------------
// Filling
// ---------------------------------------------------------------------------

/// Fill every background region not 4-connected to the raster edge.
pub fn fill_holes(mask: &Raster<bool>) -> Raster<bool> {
    let (nrow, ncol) = mask.shape();
    let mut outside = Raster::new(nrow, ncol, false);
    let mut queue = VecDeque::new();
    for r in 0..nrow {
        for c in 0..ncol {
            let on_edge = r == 0 || c == 0 || r + 1 == nrow || c + 1 == ncol;
            if on_edge && !mask.get(r, c) {
                outside.set(r, c, true);
                queue.push_back((r, c));
            }
        }
    }
    while let Some((r, c)) = queue.pop_front() {
        for &(dr, dc) in &NEIGHBORS_4 {
            let (rr, cc) = (r as isize + dr, c as isize + dc);
            if mask.get_opt(rr, cc) == Some(false) && outside.get_opt(rr, cc) == Some(false) {
                outside.set(rr as usize, cc as usize, true);
                queue.push_back((rr as usize, cc as usize));
            }
        }
    }
    outside.map(|v| !v)
}

/// Copy of `boundary` with labeled edge pixels added, so crowns cut by the
/// frame become enclosed before filling.
pub fn close_at_border(boundary: &Raster<bool>, labels: &Raster<u32>) -> Raster<bool> {
    let (nrow, ncol) = boundary.shape();
    let mut closed = boundary.clone();
    for r in 0..nrow {
        for c in 0..ncol {
            let on_edge = r == 0 || c == 0 || r + 1 == nrow || c + 1 == ncol;
            if on_edge && labels.get(r, c) != 0 {
                closed.set(r, c, true);
            }
        }
    }
    closed
}

// ---------------------------------------------------------------------------
// Isolated-pixel repair
// ---------------------------------------------------------------------------

/// Number of foreground cells in each 3×3 window, zero-padded at the edge.
///
/// Separable box sum: a horizontal 3-tap pass then a vertical one.
pub fn neighborhood_sum(mask: &Raster<u8>) -> Raster<u16> {
    let (nrow, ncol) = mask.shape();
    let fg = mask.map(|v| u16::from(v != 0));
    let at = |m: &Raster<u16>, r: isize, c: isize| m.get_opt(r, c).unwrap_or(0);
    let rows = Raster::from_fn(nrow, ncol, |r, c| {
        let (r, c) = (r as isize, c as isize);
        at(&fg, r, c - 1) + at(&fg, r, c) + at(&fg, r, c + 1)
    });
    Raster::from_fn(nrow, ncol, |r, c| {
        let (r, c) = (r as isize, c as isize);
        at(&rows, r - 1, c) + at(&rows, r, c) + at(&rows, r + 1, c)
    })
}

/// Turn on every pixel whose whole 3×3 window is background but which the
/// vegetation mask marks as canopy. Returns the number of flipped pixels.
///
/// All windows are read from the mask as it was before the pass, which makes
/// the pass idempotent.
pub fn correct_isolated_pixels(final_mask: &mut Raster<u8>, vegetation: &Raster<bool>) -> usize {
    let sums = neighborhood_sum(final_mask);
    let mut flipped = 0;
    for (i, v) in final_mask.data.iter_mut().enumerate() {
        if sums.data[i] == 0 && vegetation.data[i] {
            *v = FOREGROUND;
            flipped += 1;
        }
    }
    flipped
}

// ---------------------------------------------------------------------------
// extract_boundaries: full stage
// ---------------------------------------------------------------------------

/// Trace, rasterize and fill crown outlines, then derive the final mask.
///
/// Steps:
/// 1. `trace_outlines` per label
/// 2. `rasterize_outlines` into a shared boundary mask
/// 3. `close_at_border` + `fill_holes` for solid interiors
/// 4. final mask = filled ∖ boundary, as 0/255
/// 5. `correct_isolated_pixels` against the vegetation mask
pub fn extract_boundaries(labels: &Raster<u32>, vegetation: &Raster<bool>) -> BoundaryExtraction {
    let (nrow, ncol) = labels.shape();
    let outlines = trace_outlines(labels);
    let boundary = rasterize_outlines(nrow, ncol, &outlines);
    let filled = fill_holes(&close_at_border(&boundary, labels));

    let mut final_mask = Raster::from_fn(nrow, ncol, |r, c| {
        if filled.get(r, c) && !boundary.get(r, c) {
            FOREGROUND
        } else {
            0
        }
    });
    let patched = correct_isolated_pixels(&mut final_mask, vegetation);
    debug!(
        "extract_boundaries {} outline(s), {} boundary px, {} patched px",
        outlines.len(),
        boundary.count(),
        patched
    );

    BoundaryExtraction {
        boundary,
        filled,
        final_mask,
        outlines,
        patched,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Pixel-by-pixel reference of the isolated-pixel repair.
    fn correct_scalar(final_mask: &mut Raster<u8>, vegetation: &Raster<bool>) {
        let snapshot = final_mask.clone();
        for r in 0..snapshot.nrow {
            for c in 0..snapshot.ncol {
                let mut all_bg = true;
                for dr in -1..=1 {
                    for dc in -1..=1 {
                        let v = snapshot.get_opt(r as isize + dr, c as isize + dc).unwrap_or(0);
                        all_bg &= v == 0;
                    }
                }
                if all_bg && vegetation.get(r, c) {
                    final_mask.set(r, c, FOREGROUND);
                }
            }
        }
    }

    fn pattern(nrow: usize, ncol: usize, seed: usize) -> Raster<u8> {
        Raster::from_fn(nrow, ncol, |r, c| {
            if (r * 31 + c * 17 + seed) % 7 == 0 {
                FOREGROUND
            } else {
                0
            }
        })
    }

    #[test]
    fn test_fill_holes_ring() {
        let ring = Raster::from_fn(7, 7, |r, c| {
            (r == 1 || r == 5) && (1..=5).contains(&c) || (c == 1 || c == 5) && (1..=5).contains(&r)
        });
        let filled = fill_holes(&ring);
        assert!(filled.get(3, 3));
        assert!(!filled.get(0, 0));
        assert_eq!(filled.count(), 25);
    }

    #[test]
    fn test_fill_holes_open_shape_not_filled() {
        let u = Raster::from_fn(6, 6, |r, c| {
            (c == 1 || c == 4) && r >= 1 || r == 4 && (1..=4).contains(&c)
        });
        let filled = fill_holes(&u);
        assert!(!filled.get(2, 2));
    }

    #[test]
    fn test_close_at_border_fills_edge_crown() {
        let labels = Raster::from_fn(8, 8, |r, c| if r < 4 && c < 4 { 1 } else { 0 });
        let outlines = trace_outlines(&labels);
        let boundary = rasterize_outlines(8, 8, &outlines);
        assert!(!fill_holes(&boundary).get(1, 1));
        let filled = fill_holes(&close_at_border(&boundary, &labels));
        assert!(filled.get(1, 1));
        assert!(filled.get(0, 0));
    }

    #[test]
    fn test_neighborhood_sum_zero_padding() {
        let mut m = Raster::new(3, 3, 0u8);
        m.set(0, 0, FOREGROUND);
        let s = neighborhood_sum(&m);
        assert_eq!(s.get(0, 0), 1);
        assert_eq!(s.get(1, 1), 1);
        assert_eq!(s.get(2, 2), 0);
    }

    #[test]
    fn test_vectorized_matches_scalar() {
        for seed in 0..5 {
            let vegetation = Raster::from_fn(23, 19, |r, c| (r + c + seed) % 3 != 0);
            let mut fast = pattern(23, 19, seed);
            let mut slow = fast.clone();
            correct_isolated_pixels(&mut fast, &vegetation);
            correct_scalar(&mut slow, &vegetation);
            assert_eq!(fast, slow);
        }
    }

    #[test]
    fn test_isolated_correction_idempotent() {
        let vegetation = Raster::new(20, 20, true);
        let mut mask = pattern(20, 20, 3);
        correct_isolated_pixels(&mut mask, &vegetation);
        let once = mask.clone();
        assert_eq!(correct_isolated_pixels(&mut mask, &vegetation), 0);
        assert_eq!(mask, once);
    }

    #[test]
    fn test_ring_pixels_not_patched() {
        let labels = Raster::from_fn(12, 12, |r, c| {
            if (3..9).contains(&r) && (3..9).contains(&c) {
                1
            } else {
                0
            }
        });
        let vegetation = labels.map(|v| v != 0);
        let out = extract_boundaries(&labels, &vegetation);
        assert_eq!(out.patched, 0);
        for r in 0..12 {
            for c in 0..12 {
                if out.boundary.get(r, c) {
                    assert_eq!(out.final_mask.get(r, c), 0);
                }
            }
        }
        assert_eq!(out.final_mask.get(5, 5), FOREGROUND);
    }

    #[test]
    fn test_touching_crowns_share_one_pixel_seam() {
        let labels = Raster::from_fn(10, 20, |r, c| {
            if !(2..8).contains(&r) || !(2..18).contains(&c) {
                0
            } else if c < 10 {
                1
            } else {
                2
            }
        });
        let vegetation = labels.map(|v| v != 0);
        let out = extract_boundaries(&labels, &vegetation);
        assert_eq!(out.outlines.len(), 2);
        // seam between columns 9 and 10 rounds onto the even column
        for r in 3..7 {
            assert!(out.boundary.get(r, 10));
            assert!(!out.boundary.get(r, 9));
            assert!(!out.boundary.get(r, 11));
            assert_eq!(out.final_mask.get(r, 9), FOREGROUND);
            assert_eq!(out.final_mask.get(r, 10), 0);
        }
    }
}
