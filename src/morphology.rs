//! Binary morphology with disk footprints, and the vegetation mask builder.
//!
//! Footprint cells falling outside the raster are ignored by both erosion and
//! dilation, so canopy touching the frame edge is not eaten away.

use crate::raster::Raster;
use log::debug;

/// Offsets `(dr, dc)` of a disk footprint: all cells with `dr² + dc² <= radius²`.
///
/// Radius 0 is the single centre cell.
pub fn disk(radius: usize) -> Vec<(isize, isize)> {
    let r = radius as isize;
    let mut offsets = Vec::new();
    for dr in -r..=r {
        for dc in -r..=r {
            if dr * dr + dc * dc <= r * r {
                offsets.push((dr, dc));
            }
        }
    }
    offsets
}

/// A cell stays set only if every in-bounds footprint cell is set.
pub fn erode(mask: &Raster<bool>, footprint: &[(isize, isize)]) -> Raster<bool> {
    Raster::from_fn(mask.nrow, mask.ncol, |r, c| {
        mask.get(r, c)
            && footprint.iter().all(|&(dr, dc)| {
                mask.get_opt(r as isize + dr, c as isize + dc).unwrap_or(true)
            })
    })
}

/// A cell becomes set if any in-bounds footprint cell is set.
pub fn dilate(mask: &Raster<bool>, footprint: &[(isize, isize)]) -> Raster<bool> {
    Raster::from_fn(mask.nrow, mask.ncol, |r, c| {
        footprint.iter().any(|&(dr, dc)| {
            mask.get_opt(r as isize + dr, c as isize + dc).unwrap_or(false)
        })
    })
}

/// Strict threshold `index > τ`, before any morphology.
pub fn threshold_mask(index: &Raster<f64>, threshold: f64) -> Raster<bool> {
    index.map(|v| v > threshold)
}

/// Threshold the index, erode with `disk(erosion_radius)`, then dilate with
/// `disk(dilation_radius)`.
pub fn build_vegetation_mask(
    index: &Raster<f64>,
    threshold: f64,
    erosion_radius: usize,
    dilation_radius: usize,
) -> Raster<bool> {
    let raw = threshold_mask(index, threshold);
    let mut mask = erode(&raw, &disk(erosion_radius));
    mask = dilate(&mask, &disk(dilation_radius));
    debug!(
        "build_vegetation_mask τ={} raw={} px, after opening={} px",
        threshold,
        raw.count(),
        mask.count()
    );
    mask
}
