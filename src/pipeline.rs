//! `segment_crowns`: the full image → crowns pipeline and its result.
//!
//! Pipeline: extract_bands → normalize_bands → compute_index →
//!           build_vegetation_mask → separate_crowns → extract_boundaries → assemble

use crate::bands::{display_composite, extract_bands, normalize_bands};
use crate::boundary::{extract_boundaries, CrownOutline};
use crate::error::Result;
use crate::index::compute_index;
use crate::morphology::build_vegetation_mask;
use crate::params::SegmentationParams;
use crate::raster::{MultiBandRaster, Raster};
use crate::segmentation::{count_labels, separate_crowns};
use log::{debug, info, warn};
use std::time::Instant;

/// Everything one run produces. Owned by the caller, never shared between runs.
#[derive(Debug, Clone)]
pub struct CrownSegmentation {
    /// Per-pixel vegetation index.
    pub index_map: Raster<f64>,
    /// Thresholded and opened vegetation mask.
    pub vegetation_mask: Raster<bool>,
    /// Crown labels 1..=n, 0 = background.
    pub label_map: Raster<u32>,
    /// Rasterized crown outlines.
    pub boundary_mask: Raster<bool>,
    /// Filled crowns minus outlines, values 0 or 255.
    pub final_mask: Raster<u8>,
    /// Display composite with outlines painted in the boundary colour.
    pub overlay: Raster<[u8; 3]>,
    /// Distinct non-zero labels in `label_map`.
    pub crown_count: usize,
    /// Per-crown traced contours, area and centroid.
    pub crowns: Vec<CrownOutline>,
}

/// Paint `mask` cells of `base` with `color`.
pub fn paint_overlay(
    base: &Raster<[u8; 3]>,
    mask: &Raster<bool>,
    color: [u8; 3],
) -> Result<Raster<[u8; 3]>> {
    base.zip_map(mask, |px, on| if on { color } else { px })
}

/// Run the whole pipeline on one four-band image.
///
/// Parameters are validated before any stage runs. An empty vegetation mask
/// is a valid outcome: the crown stages are skipped and `crown_count` is 0.
pub fn segment_crowns(
    image: &MultiBandRaster,
    params: &SegmentationParams,
) -> Result<CrownSegmentation> {
    params.validate()?;
    let t0 = Instant::now();

    let raw = extract_bands(image)?;
    let bands = normalize_bands(&raw);
    let index_map = compute_index(&bands.red, &bands.nir, params.index)?;
    let vegetation_mask = build_vegetation_mask(
        &index_map,
        params.threshold,
        params.erosion_radius,
        params.dilation_radius,
    );
    let composite = display_composite(&raw, params.stretch_percentiles);
    let (nrow, ncol) = index_map.shape();

    if !vegetation_mask.any() {
        warn!(
            "segment_crowns: no vegetation above threshold {} ({}x{})",
            params.threshold, nrow, ncol
        );
        return Ok(CrownSegmentation {
            index_map,
            vegetation_mask,
            label_map: Raster::new(nrow, ncol, 0),
            boundary_mask: Raster::new(nrow, ncol, false),
            final_mask: Raster::new(nrow, ncol, 0),
            overlay: composite,
            crown_count: 0,
            crowns: Vec::new(),
        });
    }

    let separation = separate_crowns(&vegetation_mask, params.sigma, params.h)?;
    let boundaries = extract_boundaries(&separation.labels, &vegetation_mask);
    let overlay = paint_overlay(&composite, &boundaries.boundary, params.boundary_color)?;
    let crown_count = count_labels(&separation.labels);

    debug!(
        "segment_crowns stages done in {:.3}s",
        t0.elapsed().as_secs_f64()
    );
    info!(
        "segment_crowns {}x{}: {} crown(s), {} vegetation px",
        nrow,
        ncol,
        crown_count,
        vegetation_mask.count()
    );

    Ok(CrownSegmentation {
        index_map,
        vegetation_mask,
        label_map: separation.labels,
        boundary_mask: boundaries.boundary,
        final_mask: boundaries.final_mask,
        overlay,
        crown_count,
        crowns: boundaries.outlines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrownError;
    use crate::raster::SampleKind;

    fn blob_image(nrow: usize, ncol: usize, center: (f64, f64), radius: f64) -> MultiBandRaster {
        let inside = |r: usize, c: usize| {
            let dr = r as f64 - center.0;
            let dc = c as f64 - center.1;
            dr * dr + dc * dc <= radius * radius
        };
        let mut data = Vec::with_capacity(nrow * ncol * 4);
        for r in 0..nrow {
            for c in 0..ncol {
                let (red, nir) = if inside(r, c) { (50.0, 200.0) } else { (200.0, 50.0) };
                data.extend_from_slice(&[red, 120.0 + (c % 5) as f64, 90.0 + (r % 3) as f64, nir]);
            }
        }
        MultiBandRaster::from_interleaved(nrow, ncol, SampleKind::U8, data).unwrap()
    }

    #[test]
    fn test_rejects_bad_params_before_running() {
        let img = blob_image(10, 10, (5.0, 5.0), 3.0);
        let params = SegmentationParams { sigma: 0.0, ..Default::default() };
        assert!(matches!(segment_crowns(&img, &params), Err(CrownError::ParameterOutOfRange(_))));
    }

    #[test]
    fn test_rejects_sigma_above_bound() {
        let img = blob_image(30, 30, (15.0, 15.0), 8.0);
        let params = SegmentationParams {
            threshold: 0.3,
            sigma: 1e19,
            ..Default::default()
        };
        assert!(matches!(
            segment_crowns(&img, &params),
            Err(CrownError::ParameterOutOfRange(_))
        ));
    }

    #[test]
    fn test_rejects_three_band_image() {
        let img = MultiBandRaster::from_interleaved(4, 4, SampleKind::U8, vec![0.0; 48]).unwrap();
        assert!(matches!(
            segment_crowns(&img, &SegmentationParams::default()),
            Err(CrownError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_threshold_one_gives_empty_result() {
        let img = blob_image(40, 40, (20.0, 20.0), 10.0);
        let params = SegmentationParams { threshold: 1.0, ..Default::default() };
        let out = segment_crowns(&img, &params).unwrap();
        assert_eq!(out.crown_count, 0);
        assert!(!out.vegetation_mask.any());
        assert!(out.final_mask.data.iter().all(|&v| v == 0));
        assert!(out.label_map.data.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_overlay_paints_boundary() {
        let img = blob_image(60, 60, (30.0, 30.0), 12.0);
        let params = SegmentationParams { threshold: 0.3, ..Default::default() };
        let out = segment_crowns(&img, &params).unwrap();
        assert_eq!(out.crown_count, 1);
        for (i, &b) in out.boundary_mask.data.iter().enumerate() {
            if b {
                assert_eq!(out.overlay.data[i], params.boundary_color);
            }
        }
        assert!(out.boundary_mask.any());
    }

    #[test]
    fn test_final_mask_is_binary() {
        let img = blob_image(50, 50, (25.0, 25.0), 12.0);
        let params = SegmentationParams { threshold: 0.3, ..Default::default() };
        let out = segment_crowns(&img, &params).unwrap();
        assert!(out.final_mask.data.iter().all(|&v| v == 0 || v == 255));
        assert_eq!(out.final_mask.shape(), (50, 50));
    }
}
