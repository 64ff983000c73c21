//! Row-major 2D rasters and the interleaved multi-band image they are cut from.

use crate::error::{CrownError, Result};
use std::ops::{Index, IndexMut};

/// A 2D raster (row-major). Origin is top-left: `(row, col)` = `(y, x)`.
///
/// Every per-pixel product of the pipeline is a `Raster`: bands (`u8`), the
/// index map (`f64`), masks (`bool`), label maps (`u32`) and the overlay
/// (`[u8; 3]`).
#[derive(Debug, Clone, PartialEq)]
pub struct Raster<T> {
    pub nrow: usize,
    pub ncol: usize,
    pub data: Vec<T>,
}

impl<T: Copy> Raster<T> {
    /// Create a new raster filled with a constant value.
    pub fn new(nrow: usize, ncol: usize, fill: T) -> Self {
        Self {
            nrow,
            ncol,
            data: vec![fill; nrow * ncol],
        }
    }

    /// Create a raster from an existing Vec (row-major).
    pub fn from_vec(nrow: usize, ncol: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != nrow * ncol {
            return Err(CrownError::InvalidInput(format!(
                "raster of {}x{} needs {} cells, got {}",
                nrow,
                ncol,
                nrow * ncol,
                data.len()
            )));
        }
        Ok(Self { nrow, ncol, data })
    }

    /// Build a raster by evaluating `f(row, col)` for every cell.
    pub fn from_fn<F: FnMut(usize, usize) -> T>(nrow: usize, ncol: usize, mut f: F) -> Self {
        let mut data = Vec::with_capacity(nrow * ncol);
        for r in 0..nrow {
            for c in 0..ncol {
                data.push(f(r, c));
            }
        }
        Self { nrow, ncol, data }
    }

    /// Get value at (row, col). Panics when out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.ncol + col]
    }

    /// Get value at a signed (row, col); `None` outside the raster.
    #[inline]
    pub fn get_opt(&self, row: isize, col: isize) -> Option<T> {
        if row >= 0 && col >= 0 && (row as usize) < self.nrow && (col as usize) < self.ncol {
            Some(self.data[row as usize * self.ncol + col as usize])
        } else {
            None
        }
    }

    /// Set value at (row, col). Out-of-bounds writes are ignored.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        if row < self.nrow && col < self.ncol {
            self.data[row * self.ncol + col] = val;
        }
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.nrow * self.ncol
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (nrow, ncol)
    pub fn shape(&self) -> (usize, usize) {
        (self.nrow, self.ncol)
    }

    pub fn same_shape<U>(&self, other: &Raster<U>) -> bool {
        self.nrow == other.nrow && self.ncol == other.ncol
    }

    /// Apply a function to every cell.
    pub fn map<U: Copy, F: Fn(T) -> U>(&self, f: F) -> Raster<U> {
        Raster {
            nrow: self.nrow,
            ncol: self.ncol,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Combine two rasters of identical shape cell by cell.
    pub fn zip_map<U: Copy, V: Copy, F: Fn(T, U) -> V>(
        &self,
        other: &Raster<U>,
        f: F,
    ) -> Result<Raster<V>> {
        if !self.same_shape(other) {
            return Err(CrownError::InvalidInput(format!(
                "raster shapes differ: {}x{} vs {}x{}",
                self.nrow, self.ncol, other.nrow, other.ncol
            )));
        }
        Ok(Raster {
            nrow: self.nrow,
            ncol: self.ncol,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }
}

impl Raster<bool> {
    /// Number of `true` cells.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }
}

impl<T> Index<(usize, usize)> for Raster<T> {
    type Output = T;
    fn index(&self, (r, c): (usize, usize)) -> &T {
        &self.data[r * self.ncol + c]
    }
}

impl<T> IndexMut<(usize, usize)> for Raster<T> {
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut T {
        &mut self.data[r * self.ncol + c]
    }
}

/// Native sample type of a decoded image. Only `U8` bands skip rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

/// Pixel-interleaved multi-band image (`nrow × ncol × nbands`), samples widened to `f64`.
#[derive(Debug, Clone)]
pub struct MultiBandRaster {
    pub nrow: usize,
    pub ncol: usize,
    pub nbands: usize,
    pub kind: SampleKind,
    pub data: Vec<f64>,
}

impl MultiBandRaster {
    /// Wrap interleaved samples; the band count is derived from the sample count.
    pub fn from_interleaved(
        nrow: usize,
        ncol: usize,
        kind: SampleKind,
        data: Vec<f64>,
    ) -> Result<Self> {
        let pixels = nrow * ncol;
        if pixels == 0 {
            return Err(CrownError::InvalidInput(format!(
                "empty image ({}x{})",
                nrow, ncol
            )));
        }
        if data.len() % pixels != 0 {
            return Err(CrownError::InvalidInput(format!(
                "{} samples do not divide into {}x{} pixels",
                data.len(),
                nrow,
                ncol
            )));
        }
        Ok(Self {
            nrow,
            ncol,
            nbands: data.len() / pixels,
            kind,
            data,
        })
    }

    /// Interleave separate band planes. All planes must share one shape.
    pub fn from_bands(kind: SampleKind, bands: &[Raster<f64>]) -> Result<Self> {
        let first = bands
            .first()
            .ok_or_else(|| CrownError::InvalidInput("no bands given".into()))?;
        if let Some(bad) = bands.iter().find(|b| !b.same_shape(first)) {
            return Err(CrownError::InvalidInput(format!(
                "band dimensions differ: {}x{} vs {}x{}",
                first.nrow, first.ncol, bad.nrow, bad.ncol
            )));
        }
        let nbands = bands.len();
        let mut data = vec![0.0; first.len() * nbands];
        for (b, band) in bands.iter().enumerate() {
            for (px, &v) in band.data.iter().enumerate() {
                data[px * nbands + b] = v;
            }
        }
        Self::from_interleaved(first.nrow, first.ncol, kind, data)
    }

    /// Copy one band out as its own raster. The source is left untouched.
    pub fn band(&self, b: usize) -> Result<Raster<f64>> {
        if b >= self.nbands {
            return Err(CrownError::InvalidInput(format!(
                "band {} requested from a {}-band image",
                b, self.nbands
            )));
        }
        let data = (0..self.nrow * self.ncol)
            .map(|px| self.data[px * self.nbands + b])
            .collect();
        Raster::from_vec(self.nrow, self.ncol, data)
    }
}
