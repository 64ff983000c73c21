//! Exact Euclidean distance transform (Felzenszwalb & Huttenlocher).

use crate::raster::Raster;

/// Stand-in for "no background seen yet" in the squared-distance passes.
const FAR: f64 = 1e20;

/// Lower envelope of parabolas rooted at `(q, f[q])`; writes squared distances to `d`.
fn edt_1d(f: &[f64], d: &mut [f64], v: &mut [usize], z: &mut [f64]) {
    let n = f.len();
    if n == 0 {
        return;
    }
    let mut k = 0usize;
    v[0] = 0;
    z[0] = f64::NEG_INFINITY;
    z[1] = f64::INFINITY;
    for q in 1..n {
        let qf = q as f64;
        let mut s;
        // z[0] is -inf, so the scan always stops at k == 0
        loop {
            let p = v[k] as f64;
            s = ((f[q] + qf * qf) - (f[v[k]] + p * p)) / (2.0 * qf - 2.0 * p);
            if s <= z[k] {
                k -= 1;
            } else {
                break;
            }
        }
        k += 1;
        v[k] = q;
        z[k] = s;
        z[k + 1] = f64::INFINITY;
    }
    k = 0;
    for (q, out) in d.iter_mut().enumerate().take(n) {
        let qf = q as f64;
        while z[k + 1] < qf {
            k += 1;
        }
        let p = v[k] as f64;
        *out = (qf - p) * (qf - p) + f[v[k]];
    }
}

/// Distance from every `true` cell to the nearest `false` cell; 0 on `false` cells.
///
/// A mask with no `false` cell at all is measured against the raster frame
/// instead, i.e. as if the outside of the raster were background.
pub fn distance_transform(mask: &Raster<bool>) -> Raster<f64> {
    let (nrow, ncol) = mask.shape();
    if mask.is_empty() {
        return Raster::new(nrow, ncol, 0.0);
    }
    if mask.data.iter().all(|&v| v) {
        return Raster::from_fn(nrow, ncol, |r, c| {
            (r + 1).min(c + 1).min(nrow - r).min(ncol - c) as f64
        });
    }

    let mut sq = mask.map(|v| if v { FAR } else { 0.0 });
    let longest = nrow.max(ncol);
    let mut f = vec![0.0; longest];
    let mut d = vec![0.0; longest];
    let mut v = vec![0usize; longest];
    let mut z = vec![0.0; longest + 1];

    // columns
    for c in 0..ncol {
        for r in 0..nrow {
            f[r] = sq.get(r, c);
        }
        edt_1d(&f[..nrow], &mut d[..nrow], &mut v, &mut z);
        for r in 0..nrow {
            sq.set(r, c, d[r]);
        }
    }
    // rows
    for r in 0..nrow {
        let row = &mut sq.data[r * ncol..(r + 1) * ncol];
        f[..ncol].copy_from_slice(row);
        edt_1d(&f[..ncol], &mut d[..ncol], &mut v, &mut z);
        row.copy_from_slice(&d[..ncol]);
    }
    sq.map(f64::sqrt)
}
