//! Vegetation index from normalized red and near-infrared bands.

use crate::error::Result;
use crate::params::VegetationIndex;
use crate::raster::Raster;

/// Additive guard on the NDVI denominator.
pub const NDVI_EPSILON: f64 = 1e-10;

/// `(N - R) / (N + R + ε)` on reflectances already scaled to [0, 1].
#[inline]
pub fn ndvi(r: f64, n: f64) -> f64 {
    (n - r) / (n + r + NDVI_EPSILON)
}

/// `2.4 (N - R) / (N + R + 1)` on reflectances already scaled to [0, 1].
#[inline]
pub fn evi2(r: f64, n: f64) -> f64 {
    2.4 * ((n - r) / (n + r + 1.0))
}

/// Evaluate the chosen index over the full raster.
///
/// Both bands are divided by 255 first. Fails with `InvalidInput` when the
/// band shapes differ. Output is finite for every pixel.
pub fn compute_index(
    red: &Raster<u8>,
    nir: &Raster<u8>,
    kind: VegetationIndex,
) -> Result<Raster<f64>> {
    let f = match kind {
        VegetationIndex::Ndvi => ndvi,
        VegetationIndex::Evi2 => evi2,
    };
    red.zip_map(nir, |r, n| f(r as f64 / 255.0, n as f64 / 255.0))
}
