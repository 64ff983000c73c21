//! Run-time parameters of the crown segmentation pipeline.

use crate::error::{out_of_range, Result};
use crate::segmentation::MAX_SIGMA;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Vegetation index derived from the red and near-infrared bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VegetationIndex {
    /// `(N - R) / (N + R + ε)`, range [-1, 1].
    #[default]
    Ndvi,
    /// Two-band enhanced index `2.4 (N - R) / (N + R + 1)`, range (-2.4, 2.4).
    Evi2,
}

/// Parameters for one pipeline run.
///
/// Defaults: `threshold` = 0.5, `sigma` = 1.0, `h` = 0.1, `erosion_radius` = 2,
/// `dilation_radius` = 5, NDVI, display stretch between the 2nd and 98th
/// percentile, yellow outlines on the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationParams {
    /// Index threshold τ; a pixel is vegetation when `index > τ`.
    pub threshold: f64,
    /// Gaussian std-dev applied to the distance map (pixels).
    pub sigma: f64,
    /// Minimum prominence of a distance-map peak to seed a crown.
    pub h: f64,
    /// Radius of the disk used to erode the raw mask.
    pub erosion_radius: usize,
    /// Radius of the disk used to dilate the eroded mask.
    pub dilation_radius: usize,
    pub index: VegetationIndex,
    /// Low/high percentiles of the display stretch.
    pub stretch_percentiles: (f64, f64),
    /// Overlay colour of traced crown outlines.
    pub boundary_color: [u8; 3],
}

impl Default for SegmentationParams {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            sigma: 1.0,
            h: 0.1,
            erosion_radius: 2,
            dilation_radius: 5,
            index: VegetationIndex::Ndvi,
            stretch_percentiles: (2.0, 98.0),
            boundary_color: [255, 255, 0],
        }
    }
}

impl SegmentationParams {
    /// Reject parameter sets the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(out_of_range(format!(
                "threshold {} outside [0, 1]",
                self.threshold
            )));
        }
        if !(self.sigma > 0.0 && self.sigma <= MAX_SIGMA) {
            return Err(out_of_range(format!(
                "sigma {} outside (0, {}]",
                self.sigma, MAX_SIGMA
            )));
        }
        if !(self.h.is_finite() && self.h > 0.0) {
            return Err(out_of_range(format!("h {} must be > 0", self.h)));
        }
        let (lo, hi) = self.stretch_percentiles;
        if !(0.0 <= lo && lo < hi && hi <= 100.0) {
            return Err(out_of_range(format!(
                "stretch percentiles ({}, {}) must satisfy 0 <= low < high <= 100",
                lo, hi
            )));
        }
        Ok(())
    }
}

/// Read parameters from a JSON file. Missing fields keep their defaults.
pub fn load_params(path: &Path) -> Result<SegmentationParams> {
    let contents = fs::read_to_string(path)?;
    let params: SegmentationParams = serde_json::from_str(&contents)?;
    Ok(params)
}
