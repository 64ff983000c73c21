//! File formats around the pipeline: multi-band TIFF in, PNG masks and
//! overlays plus a crown CSV out.
//!
//! The source image is only ever read; it is never moved, renamed or deleted.

use crate::boundary::CrownOutline;
use crate::error::{invalid_input, Result};
use crate::raster::{MultiBandRaster, Raster, SampleKind};
use image::{GrayImage, ImageFormat, RgbImage};
use log::debug;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult};

/// Sub-directory (next to the input image) that receives saved masks.
pub const MASKS_DIR: &str = "masks";

// ==========================================================================
// TIFF loading
// ==========================================================================

fn widen<T: Copy + Into<f64>>(v: Vec<T>) -> Vec<f64> {
    v.into_iter().map(Into::into).collect()
}

/// Decode a (multi-band, pixel-interleaved) TIFF into a [`MultiBandRaster`].
///
/// The native sample type is kept in `kind` so 8-bit bands can bypass rescaling.
pub fn load_multiband_tiff(path: &Path) -> Result<MultiBandRaster> {
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let (width, height) = decoder.dimensions()?;
    let ncol = width as usize;
    let nrow = height as usize;

    let (kind, data) = match decoder.read_image()? {
        DecodingResult::U8(v) => (SampleKind::U8, widen(v)),
        DecodingResult::U16(v) => (SampleKind::U16, widen(v)),
        DecodingResult::U32(v) => (SampleKind::U32, widen(v)),
        DecodingResult::U64(v) => (SampleKind::U64, v.into_iter().map(|x| x as f64).collect()),
        DecodingResult::I8(v) => (SampleKind::I8, widen(v)),
        DecodingResult::I16(v) => (SampleKind::I16, widen(v)),
        DecodingResult::I32(v) => (SampleKind::I32, widen(v)),
        DecodingResult::I64(v) => (SampleKind::I64, v.into_iter().map(|x| x as f64).collect()),
        DecodingResult::F32(v) => (SampleKind::F32, widen(v)),
        DecodingResult::F64(v) => (SampleKind::F64, v),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(invalid_input(format!(
                "{}: unsupported TIFF sample format",
                path.display()
            )))
        }
    };
    let image = MultiBandRaster::from_interleaved(nrow, ncol, kind, data)?;
    debug!(
        "load_multiband_tiff {}: {}x{}, {} band(s), {:?}",
        path.display(),
        ncol,
        nrow,
        image.nbands,
        kind
    );
    Ok(image)
}

// ==========================================================================
// Mask / overlay persistence
// ==========================================================================

/// `<input dir>/masks/<input stem>.png`
pub fn mask_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "mask".to_string());
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    dir.join(MASKS_DIR).join(format!("{}.png", stem))
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Write a 0/255 mask as a single-channel 8-bit PNG, creating parent directories.
pub fn save_mask(mask: &Raster<u8>, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let img = GrayImage::from_raw(mask.ncol as u32, mask.nrow as u32, mask.data.clone())
        .ok_or_else(|| invalid_input("mask buffer does not match its dimensions"))?;
    img.save_with_format(path, ImageFormat::Png)?;
    debug!("save_mask {} ({}x{})", path.display(), mask.ncol, mask.nrow);
    Ok(())
}

/// Read a mask PNG back as 8-bit luma.
pub fn load_mask(path: &Path) -> Result<Raster<u8>> {
    let img = image::open(path)?.into_luma8();
    let (w, h) = img.dimensions();
    Raster::from_vec(h as usize, w as usize, img.into_raw())
}

/// Write the RGB overlay as PNG.
pub fn save_overlay(overlay: &Raster<[u8; 3]>, path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let raw: Vec<u8> = overlay.data.iter().flat_map(|px| px.iter().copied()).collect();
    let img = RgbImage::from_raw(overlay.ncol as u32, overlay.nrow as u32, raw)
        .ok_or_else(|| invalid_input("overlay buffer does not match its dimensions"))?;
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}

// ==========================================================================
// Crown CSV
// ==========================================================================

/// WKT polygon of the longest contour, in pixel units (x = col, y = row).
pub fn crown_wkt(crown: &CrownOutline) -> String {
    let Some(contour) = crown.contours.iter().max_by_key(|c| c.points.len()) else {
        return "POLYGON EMPTY".to_string();
    };
    let mut wkt = String::from("POLYGON((");
    for (i, &(r, c)) in contour.points.iter().enumerate() {
        if i > 0 {
            wkt.push(',');
        }
        wkt.push_str(&format!("{:.1} {:.1}", c, r));
    }
    // Close the ring of contours cut open by the frame
    if !contour.is_closed() {
        if let Some(&(r, c)) = contour.points.first() {
            wkt.push_str(&format!(",{:.1} {:.1}", c, r));
        }
    }
    wkt.push_str("))");
    wkt
}

/// One row per crown: label, area, centroid, contour count, WKT outline.
pub fn export_crowns_csv(crowns: &[CrownOutline], path: &Path) -> Result<()> {
    ensure_parent_dir(path)?;
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record([
        "label",
        "area_px",
        "centroid_row",
        "centroid_col",
        "n_contours",
        "polygon_wkt",
    ])?;
    for crown in crowns {
        wtr.write_record([
            crown.label.to_string(),
            crown.area_px.to_string(),
            format!("{:.2}", crown.centroid.0),
            format!("{:.2}", crown.centroid.1),
            crown.contours.len().to_string(),
            crown_wkt(crown),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
