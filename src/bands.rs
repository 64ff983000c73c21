//! Band extraction and the two band normalizations.
//!
//! The index is computed from min-max normalized bands ([`normalize_minmax`]).
//! The overlay background uses a percentile clip-and-stretch ([`stretch_percentile`]).
//! The two never feed each other.

use crate::error::{invalid_input, CrownError, Result};
use crate::raster::{MultiBandRaster, Raster, SampleKind};
use log::{debug, warn};
use std::cmp::Ordering;

/// Native-range copies of the four bands, in (R, G, B, N) order.
#[derive(Debug, Clone)]
pub struct RawBands {
    pub kind: SampleKind,
    pub red: Raster<f64>,
    pub green: Raster<f64>,
    pub blue: Raster<f64>,
    pub nir: Raster<f64>,
}

/// 8-bit bands as consumed by the index computer.
#[derive(Debug, Clone)]
pub struct Bands {
    pub red: Raster<u8>,
    pub green: Raster<u8>,
    pub blue: Raster<u8>,
    pub nir: Raster<u8>,
}

/// Split the first four channels out of `image`. Extra channels are ignored.
pub fn extract_bands(image: &MultiBandRaster) -> Result<RawBands> {
    if image.nbands < 4 {
        return Err(invalid_input(format!(
            "expected at least 4 bands (R, G, B, NIR), got {}",
            image.nbands
        )));
    }
    debug!(
        "extract_bands {}x{} with {} band(s), {:?} samples",
        image.nrow, image.ncol, image.nbands, image.kind
    );
    Ok(RawBands {
        kind: image.kind,
        red: image.band(0)?,
        green: image.band(1)?,
        blue: image.band(2)?,
        nir: image.band(3)?,
    })
}

/// Finite (min, max) of a band, or `None` when it holds no finite value.
fn finite_range(band: &Raster<f64>) -> Option<(f64, f64)> {
    band.data
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Rescale a band to [0, 255] with `255 (v - min) / (max - min)`.
///
/// 8-bit bands pass through unchanged. A constant band maps to all zeros.
/// Non-finite samples map to 0.
pub fn normalize_minmax(band: &Raster<f64>, kind: SampleKind) -> Raster<u8> {
    if kind == SampleKind::U8 {
        return band.map(|v| v.clamp(0.0, 255.0) as u8);
    }
    match finite_range(band) {
        Some((lo, hi)) if hi > lo => {
            let span = hi - lo;
            band.map(|v| {
                if v.is_finite() {
                    ((v - lo) / span * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
        }
        _ => {
            debug!("normalize_minmax constant band -> zeros");
            Raster::new(band.nrow, band.ncol, 0)
        }
    }
}

/// Normalize all four bands for index computation.
pub fn normalize_bands(raw: &RawBands) -> Bands {
    Bands {
        red: normalize_minmax(&raw.red, raw.kind),
        green: normalize_minmax(&raw.green, raw.kind),
        blue: normalize_minmax(&raw.blue, raw.kind),
        nir: normalize_minmax(&raw.nir, raw.kind),
    }
}

/// Percentile with linear interpolation between closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Display stretch: clip to the `[lo_pct, hi_pct]` percentiles, then scale to [0, 255].
///
/// Fails with `NumericDegeneracy` when both percentiles coincide.
pub fn stretch_percentile(band: &Raster<f64>, lo_pct: f64, hi_pct: f64) -> Result<Raster<u8>> {
    let mut values: Vec<f64> = band.data.iter().copied().filter(|v| v.is_finite()).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let (p_lo, p_hi) = match (percentile(&values, lo_pct), percentile(&values, hi_pct)) {
        (Some(a), Some(b)) => (a, b),
        _ => return Err(CrownError::NumericDegeneracy("band has no finite sample".into())),
    };
    if p_hi <= p_lo {
        return Err(CrownError::NumericDegeneracy(format!(
            "band is constant between percentiles {} and {} (value {})",
            lo_pct, hi_pct, p_lo
        )));
    }
    let span = p_hi - p_lo;
    Ok(band.map(|v| {
        if v.is_finite() {
            ((v.clamp(p_lo, p_hi) - p_lo) / span * 255.0) as u8
        } else {
            0
        }
    }))
}

/// RGB display composite for the overlay, one percentile stretch per band.
///
/// A degenerate band is recovered as an all-zero channel.
pub fn display_composite(raw: &RawBands, percentiles: (f64, f64)) -> Raster<[u8; 3]> {
    let (lo, hi) = percentiles;
    let stretch = |name: &str, band: &Raster<f64>| match stretch_percentile(band, lo, hi) {
        Ok(b) => b,
        Err(e) => {
            warn!("display stretch of {} band: {}; using zeros", name, e);
            Raster::new(band.nrow, band.ncol, 0)
        }
    };
    let r = stretch("red", &raw.red);
    let g = stretch("green", &raw.green);
    let b = stretch("blue", &raw.blue);
    Raster::from_fn(r.nrow, r.ncol, |row, col| {
        [r.get(row, col), g.get(row, col), b.get(row, col)]
    })
}
