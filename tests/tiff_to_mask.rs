mod common;

use common::{disk_mask, init_logging, rgbn_samples};
use ndvicrown::io::{export_crowns_csv, load_mask, load_multiband_tiff, mask_path_for, save_mask};
use ndvicrown::{segment_crowns, SampleKind, SegmentationParams};
use std::fs::File;
use tiff::encoder::{colortype, TiffEncoder};

const NROW: usize = 64;
const NCOL: usize = 96;

fn params() -> SegmentationParams {
    SegmentationParams {
        threshold: 0.3,
        ..Default::default()
    }
}

#[test]
fn rgba8_tiff_to_mask_png() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let tif = dir.path().join("tile_001.tif");

    let mask = disk_mask(NROW, NCOL, &[(32.0, 25.0), (32.0, 70.0)], 14.0);
    let data: Vec<u8> = rgbn_samples(&mask, 1.0).into_iter().map(|v| v as u8).collect();
    {
        let mut file = File::create(&tif).unwrap();
        let mut enc = TiffEncoder::new(&mut file).unwrap();
        enc.write_image::<colortype::RGBA8>(NCOL as u32, NROW as u32, &data).unwrap();
    }

    let image = load_multiband_tiff(&tif).unwrap();
    assert_eq!((image.nrow, image.ncol, image.nbands), (NROW, NCOL, 4));
    assert_eq!(image.kind, SampleKind::U8);

    let seg = segment_crowns(&image, &params()).unwrap();
    assert_eq!(seg.crown_count, 2);

    let out = mask_path_for(&tif);
    assert_eq!(out, dir.path().join("masks").join("tile_001.png"));
    save_mask(&seg.final_mask, &out).unwrap();
    assert_eq!(load_mask(&out).unwrap(), seg.final_mask);

    // the input is left in place
    assert!(tif.exists());

    let csv_path = dir.path().join("crowns.csv");
    export_crowns_csv(&seg.crowns, &csv_path).unwrap();
    let rows = csv::Reader::from_path(&csv_path).unwrap().records().count();
    assert_eq!(rows, 2);
}

#[test]
fn rgba16_tiff_is_rescaled_per_band() {
    init_logging();
    let dir = tempfile::tempdir().unwrap();
    let tif = dir.path().join("tile_16.tif");

    let mask = disk_mask(NROW, NCOL, &[(30.0, 45.0)], 18.0);
    let data: Vec<u16> = rgbn_samples(&mask, 100.0).into_iter().map(|v| v as u16).collect();
    {
        let mut file = File::create(&tif).unwrap();
        let mut enc = TiffEncoder::new(&mut file).unwrap();
        enc.write_image::<colortype::RGBA16>(NCOL as u32, NROW as u32, &data).unwrap();
    }

    let image = load_multiband_tiff(&tif).unwrap();
    assert_eq!(image.kind, SampleKind::U16);

    let seg = segment_crowns(&image, &params()).unwrap();
    assert_eq!(seg.crown_count, 1);
    // min-max rescaling drives red to 0 and NIR to 255 inside the crown
    assert!(seg.index_map.get(30, 45) > 0.99);
    assert!(seg.index_map.get(0, 0) < -0.99);
}

#[test]
fn three_band_tiff_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let tif = dir.path().join("rgb.tif");
    let data = vec![128u8; 16 * 16 * 3];
    {
        let mut file = File::create(&tif).unwrap();
        let mut enc = TiffEncoder::new(&mut file).unwrap();
        enc.write_image::<colortype::RGB8>(16, 16, &data).unwrap();
    }
    let image = load_multiband_tiff(&tif).unwrap();
    assert_eq!(image.nbands, 3);
    assert!(matches!(
        segment_crowns(&image, &params()),
        Err(ndvicrown::CrownError::InvalidInput(_))
    ));
}
