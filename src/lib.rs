//! # ndvicrown: tree crown delineation from RGB + NIR aerial imagery
//!
//! A four-band raster goes in; a labeled crown map, a 0/255 crown mask, an
//! outline overlay and a crown count come out.
//!
//! This crate provides:
//! - **Pipeline**: `extract_bands` → `compute_index` → `build_vegetation_mask`
//!   → `separate_crowns` → `extract_boundaries`, orchestrated by
//!   [`segment_crowns`]
//! - **I/O**: multi-band TIFF loading, mask/overlay PNG, crown CSV
//! - **Background runs**: [`worker::spawn_segmentation`] with a caller-side
//!   cancellation token

pub mod bands;
pub mod boundary;
pub mod contours;
pub mod distance;
pub mod error;
pub mod index;
pub mod io;
pub mod morphology;
pub mod params;
pub mod pipeline;
pub mod raster;
pub mod segmentation;
pub mod worker;

pub use error::{CrownError, Result};
pub use params::{load_params, SegmentationParams, VegetationIndex};
pub use pipeline::{segment_crowns, CrownSegmentation};
pub use raster::{MultiBandRaster, Raster, SampleKind};
