#![allow(dead_code)]

use ndvicrown::{MultiBandRaster, Raster, SampleKind};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// True inside any of the disks (`dr² + dc² <= radius²`).
pub fn disk_mask(nrow: usize, ncol: usize, centers: &[(f64, f64)], radius: f64) -> Raster<bool> {
    Raster::from_fn(nrow, ncol, |r, c| {
        centers.iter().any(|&(cr, cc)| {
            let dr = r as f64 - cr;
            let dc = c as f64 - cc;
            dr * dr + dc * dc <= radius * radius
        })
    })
}

/// Interleaved R, G, B, N samples: vegetation (low red, high NIR) inside the
/// disks, bare ground (high red, low NIR) elsewhere, textured G/B.
pub fn rgbn_samples(mask: &Raster<bool>, scale: f64) -> Vec<f64> {
    let mut data = Vec::with_capacity(mask.len() * 4);
    for r in 0..mask.nrow {
        for c in 0..mask.ncol {
            let (red, nir) = if mask.get(r, c) { (50.0, 200.0) } else { (200.0, 50.0) };
            let green = 100.0 + ((r * 7 + c * 3) % 40) as f64;
            let blue = 60.0 + ((r + c) % 25) as f64;
            data.extend_from_slice(&[red * scale, green * scale, blue * scale, nir * scale]);
        }
    }
    data
}

/// 8-bit four-band image with vegetation disks.
pub fn disk_image(
    nrow: usize,
    ncol: usize,
    centers: &[(f64, f64)],
    radius: f64,
) -> MultiBandRaster {
    let mask = disk_mask(nrow, ncol, centers, radius);
    MultiBandRaster::from_interleaved(nrow, ncol, SampleKind::U8, rgbn_samples(&mask, 1.0))
        .expect("synthetic image has consistent dimensions")
}

/// Distinct non-zero labels, sorted.
pub fn label_set(labels: &Raster<u32>) -> Vec<u32> {
    let mut set: Vec<u32> = labels.data.iter().copied().filter(|&v| v != 0).collect();
    set.sort_unstable();
    set.dedup();
    set
}

pub fn label_area(labels: &Raster<u32>, label: u32) -> usize {
    labels.data.iter().filter(|&&v| v == label).count()
}
