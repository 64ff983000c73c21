//! Crown separation: distance transform → Gaussian smoothing → h-maxima
//! markers → marker-controlled watershed.
//!
//! The watershed surface is the smoothed distance-to-background, so basins
//! meet at the narrow necks between overlapping crowns. `sigma` and `h` trade
//! over-segmentation against merged crowns.

use crate::distance::distance_transform;
use crate::error::Result;
use crate::raster::Raster;
use log::debug;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, VecDeque};

/// 4-connected neighbours.
pub const NEIGHBORS_4: [(isize, isize); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// 8-connected neighbours.
pub const NEIGHBORS_8: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

// ---------------------------------------------------------------------------
// Public result types
// ---------------------------------------------------------------------------

/// Intermediate and final rasters of [`separate_crowns`].
#[derive(Debug, Clone)]
pub struct CrownSeparation {
    /// Euclidean distance to the nearest background pixel (0 outside the mask).
    pub distance: Raster<f64>,
    /// Gaussian-smoothed distance map (the watershed surface, negated).
    pub smoothed: Raster<f64>,
    /// h-maxima regions, one positive label per connected region.
    pub markers: Raster<u32>,
    /// Crown labels 1..=n (0 = background).
    pub labels: Raster<u32>,
}

// ---------------------------------------------------------------------------
// Gaussian smoothing
// ---------------------------------------------------------------------------

/// Largest accepted Gaussian sigma, in pixels.
pub const MAX_SIGMA: f64 = 1000.0;

/// Gaussian smoothing (2D separable). `sigma` in pixels, clamped to [`MAX_SIGMA`].
///
/// The kernel is truncated at 4σ; samples beyond the raster edge repeat the
/// nearest edge value. Taps further out than the raster extent only ever read
/// the edge value, so their weight is folded into the outermost kept tap.
pub fn gaussian_smooth(src: &Raster<f64>, sigma: f64) -> Raster<f64> {
    if sigma.is_nan() || sigma <= 0.0 || src.is_empty() {
        return src.clone();
    }
    let sigma = sigma.min(MAX_SIGMA);
    let (nrow, ncol) = src.shape();
    let full = (4.0 * sigma + 0.5) as isize;
    let radius = full.min(nrow.max(ncol) as isize);
    let weight = |i: isize| {
        let x = i as f64;
        (-x * x / (2.0 * sigma * sigma)).exp()
    };
    let mut kernel: Vec<f64> = (-radius..=radius).map(weight).collect();
    let tail: f64 = (radius + 1..=full).map(weight).sum();
    let last = kernel.len() - 1;
    kernel[0] += tail;
    kernel[last] += tail;
    let ksum: f64 = kernel.iter().sum();
    let kernel: Vec<f64> = kernel.iter().map(|v| v / ksum).collect();

    let clamp = |i: isize, n: usize| i.clamp(0, n as isize - 1) as usize;

    // Horizontal pass
    let tmp = Raster::from_fn(nrow, ncol, |r, c| {
        (-radius..=radius)
            .zip(kernel.iter())
            .map(|(di, k)| src.get(r, clamp(c as isize + di, ncol)) * k)
            .sum::<f64>()
    });
    // Vertical pass
    Raster::from_fn(nrow, ncol, |r, c| {
        (-radius..=radius)
            .zip(kernel.iter())
            .map(|(di, k)| tmp.get(clamp(r as isize + di, nrow), c) * k)
            .sum::<f64>()
    })
}

// ---------------------------------------------------------------------------
// h-maxima
// ---------------------------------------------------------------------------

/// Greyscale reconstruction by dilation of `marker` under `mask` (8-connected).
///
/// Hybrid algorithm: one forward raster scan, one backward raster scan that
/// seeds a FIFO, then queue propagation. `marker` is first clipped to `mask`.
pub fn reconstruct_by_dilation(marker: &Raster<f64>, mask: &Raster<f64>) -> Result<Raster<f64>> {
    let (nrow, ncol) = mask.shape();
    let mut rec = marker.zip_map(mask, f64::min)?;
    let forward: [(isize, isize); 4] = [(-1, -1), (-1, 0), (-1, 1), (0, -1)];
    let backward: [(isize, isize); 4] = [(1, 1), (1, 0), (1, -1), (0, 1)];

    for r in 0..nrow {
        for c in 0..ncol {
            let mut m = rec.get(r, c);
            for &(dr, dc) in &forward {
                if let Some(v) = rec.get_opt(r as isize + dr, c as isize + dc) {
                    m = m.max(v);
                }
            }
            rec.set(r, c, m.min(mask.get(r, c)));
        }
    }

    let mut queue = VecDeque::new();
    for r in (0..nrow).rev() {
        for c in (0..ncol).rev() {
            let mut m = rec.get(r, c);
            for &(dr, dc) in &backward {
                if let Some(v) = rec.get_opt(r as isize + dr, c as isize + dc) {
                    m = m.max(v);
                }
            }
            let m = m.min(mask.get(r, c));
            rec.set(r, c, m);
            let seeds = backward.iter().any(|&(dr, dc)| {
                let (rr, cc) = (r as isize + dr, c as isize + dc);
                match (rec.get_opt(rr, cc), mask.get_opt(rr, cc)) {
                    (Some(q), Some(mq)) => q < m && q < mq,
                    _ => false,
                }
            });
            if seeds {
                queue.push_back((r, c));
            }
        }
    }

    while let Some((r, c)) = queue.pop_front() {
        let p = rec.get(r, c);
        for &(dr, dc) in &NEIGHBORS_8 {
            let (rr, cc) = (r as isize + dr, c as isize + dc);
            if let (Some(q), Some(mq)) = (rec.get_opt(rr, cc), mask.get_opt(rr, cc)) {
                if q < p && q != mq {
                    rec.set(rr as usize, cc as usize, p.min(mq));
                    queue.push_back((rr as usize, cc as usize));
                }
            }
        }
    }
    Ok(rec)
}

/// Cells belonging to a regional maximum whose prominence is at least `h`.
///
/// `f - R(f - h) >= h`, where `R` is reconstruction by dilation under `f`;
/// `h` is relaxed by the float resolution of each cell.
pub fn h_maxima(surface: &Raster<f64>, h: f64) -> Result<Raster<bool>> {
    const RESOLUTION: f64 = 1e-15;
    let shifted = surface.map(|v| v - h);
    let rec = reconstruct_by_dilation(&shifted, surface)?;
    Ok(Raster::from_fn(surface.nrow, surface.ncol, |r, c| {
        let v = surface.get(r, c);
        v - rec.get(r, c) >= h - RESOLUTION * v.abs()
    }))
}

// ---------------------------------------------------------------------------
// Connected components
// ---------------------------------------------------------------------------

/// Label connected `true` regions 1..=n in raster-scan order of first pixel.
///
/// Returns the label raster and `n`.
pub fn label_components(mask: &Raster<bool>, neighbors: &[(isize, isize)]) -> (Raster<u32>, u32) {
    let (nrow, ncol) = mask.shape();
    let mut labels = Raster::new(nrow, ncol, 0u32);
    let mut next_id: u32 = 0;
    let mut queue = VecDeque::new();
    for r in 0..nrow {
        for c in 0..ncol {
            if !mask.get(r, c) || labels.get(r, c) != 0 {
                continue;
            }
            next_id += 1;
            labels.set(r, c, next_id);
            queue.push_back((r, c));
            while let Some((pr, pc)) = queue.pop_front() {
                for &(dr, dc) in neighbors {
                    let (rr, cc) = (pr as isize + dr, pc as isize + dc);
                    if mask.get_opt(rr, cc) == Some(true)
                        && labels.get(rr as usize, cc as usize) == 0
                    {
                        labels.set(rr as usize, cc as usize, next_id);
                        queue.push_back((rr as usize, cc as usize));
                    }
                }
            }
        }
    }
    (labels, next_id)
}

/// Renumber non-zero labels to 1..=n by first appearance. Returns `n`.
pub fn relabel_sequential(labels: &mut Raster<u32>) -> u32 {
    let mut map: HashMap<u32, u32> = HashMap::new();
    for v in labels.data.iter_mut() {
        if *v == 0 {
            continue;
        }
        let next = map.len() as u32 + 1;
        *v = *map.entry(*v).or_insert(next);
    }
    map.len() as u32
}

/// Number of distinct non-zero labels.
pub fn count_labels(labels: &Raster<u32>) -> usize {
    let mut seen: Vec<u32> = labels.data.iter().copied().filter(|&v| v != 0).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

// ---------------------------------------------------------------------------
// watershed: marker-controlled flooding
// ---------------------------------------------------------------------------

/// Priority queue item for watershed.
#[derive(Debug)]
struct WatershedItem {
    row: usize,
    col: usize,
    height: f64,
    age: u64,
}

impl PartialEq for WatershedItem {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for WatershedItem {}

impl PartialOrd for WatershedItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WatershedItem {
    fn cmp(&self, other: &Self) -> Ordering {
        // Max-heap: higher values first, then first-in first-out among equals
        self.height
            .partial_cmp(&other.height)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.age.cmp(&self.age))
    }
}

/// Marker-controlled watershed on `surface`, flooding from its highest values.
///
/// Each marker grows into 4-connected unlabeled cells of `mask` in decreasing
/// `surface` order (equivalently, increasing order of `-surface`). Markers
/// outside `mask` are dropped. Mask cells no marker can reach stay 0.
pub fn watershed(surface: &Raster<f64>, markers: &Raster<u32>, mask: &Raster<bool>) -> Raster<u32> {
    let (nrow, ncol) = surface.shape();
    let mut labels = Raster::new(nrow, ncol, 0u32);
    let mut heap = BinaryHeap::new();
    let mut age: u64 = 0;

    for r in 0..nrow {
        for c in 0..ncol {
            let id = markers.get(r, c);
            if id == 0 || !mask.get(r, c) {
                continue;
            }
            labels.set(r, c, id);
            heap.push(WatershedItem {
                row: r,
                col: c,
                height: surface.get(r, c),
                age,
            });
            age += 1;
        }
    }

    while let Some(item) = heap.pop() {
        let seg_id = labels.get(item.row, item.col);
        for &(dr, dc) in &NEIGHBORS_4 {
            let nr = item.row as isize + dr;
            let nc = item.col as isize + dc;
            if mask.get_opt(nr, nc) != Some(true) {
                continue;
            }
            let (nr, nc) = (nr as usize, nc as usize);
            if labels.get(nr, nc) != 0 {
                continue;
            }
            labels.set(nr, nc, seg_id);
            heap.push(WatershedItem {
                row: nr,
                col: nc,
                height: surface.get(nr, nc),
                age,
            });
            age += 1;
        }
    }

    labels
}

// ---------------------------------------------------------------------------
// separate_crowns: full stage
// ---------------------------------------------------------------------------

/// Split a vegetation mask into individually labeled crowns.
///
/// Steps:
/// 1. `distance_transform` of the mask
/// 2. `gaussian_smooth` with `sigma`
/// 3. `h_maxima` with `h`, 8-connected regions labeled as markers
/// 4. `watershed` of the smoothed distance inside the mask
///
/// Labels are renumbered 1..=n.
pub fn separate_crowns(mask: &Raster<bool>, sigma: f64, h: f64) -> Result<CrownSeparation> {
    let distance = distance_transform(mask);
    let smoothed = gaussian_smooth(&distance, sigma);
    let (markers, n_markers) = label_components(&h_maxima(&smoothed, h)?, &NEIGHBORS_8);
    let mut labels = watershed(&smoothed, &markers, mask);
    let n_crowns = relabel_sequential(&mut labels);
    debug!(
        "separate_crowns σ={} h={}: {} marker region(s), {} crown(s)",
        sigma, h, n_markers, n_crowns
    );
    Ok(CrownSeparation {
        distance,
        smoothed,
        markers,
        labels,
    })
}
