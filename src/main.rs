//! Tree crown delineation on a four-band (R, G, B, NIR) TIFF.
//!
//! Usage:
//!   cargo run --release -- tile.tif
//!   cargo run --release -- tile.tif --threshold 0.4 --sigma 1.5 --h 0.2 --crowns crowns.csv
//!
//! Writes:
//!   <tile dir>/masks/<tile>.png  (crown mask, 0 / 255)

use ndvicrown::{
    io::{export_crowns_csv, load_multiband_tiff, mask_path_for, save_mask, save_overlay},
    load_params, segment_crowns, SegmentationParams, VegetationIndex,
};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

// ==========================================================================
// CLI (clap)
// ==========================================================================

#[derive(Parser, Debug)]
#[command(
    name = "ndvicrown",
    about = "Tree crown delineation from RGB + NIR imagery",
    after_help = "Writes: <input dir>/masks/<input stem>.png (crown mask, 0 / 255)"
)]
struct Cli {
    /// Four-band TIFF image(s), bands ordered R, G, B, NIR
    #[arg(value_name = "IMAGE.tif", num_args = 1..)]
    tif_paths: Vec<PathBuf>,

    /// JSON parameter file; flags below override its values
    #[arg(long, value_name = "params.json")]
    config: Option<PathBuf>,

    /// Vegetation index threshold in [0, 1]
    #[arg(long)]
    threshold: Option<f64>,

    /// Gaussian sigma applied to the distance map
    #[arg(long)]
    sigma: Option<f64>,

    /// Minimum peak prominence for a crown seed
    #[arg(long)]
    h: Option<f64>,

    /// Erosion disk radius (pixels)
    #[arg(long)]
    erosion: Option<usize>,

    /// Dilation disk radius (pixels)
    #[arg(long)]
    dilation: Option<usize>,

    /// Use the two-band enhanced vegetation index instead of NDVI
    #[arg(long)]
    evi: bool,

    /// Also write the outline overlay PNG next to the mask
    #[arg(long)]
    overlay: bool,

    /// CSV file receiving one row per crown (single input only)
    #[arg(long, value_name = "crowns.csv")]
    crowns: Option<PathBuf>,

    /// Do not write the mask
    #[arg(long)]
    no_save: bool,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(long, short)]
    verbose: bool,
}

impl Cli {
    fn params(&self) -> ndvicrown::Result<SegmentationParams> {
        let mut params = match &self.config {
            Some(path) => load_params(path)?,
            None => SegmentationParams::default(),
        };
        if let Some(v) = self.threshold {
            params.threshold = v;
        }
        if let Some(v) = self.sigma {
            params.sigma = v;
        }
        if let Some(v) = self.h {
            params.h = v;
        }
        if let Some(v) = self.erosion {
            params.erosion_radius = v;
        }
        if let Some(v) = self.dilation {
            params.dilation_radius = v;
        }
        if self.evi {
            params.index = VegetationIndex::Evi2;
        }
        params.validate()?;
        Ok(params)
    }
}

// ==========================================================================
// Main
// ==========================================================================

fn run(cli: &Cli) -> ndvicrown::Result<()> {
    let params = cli.params()?;
    println!(
        "Parameters: threshold={:.2}  sigma={:.2}  h={:.2}  erosion={}  dilation={}  index={:?}",
        params.threshold,
        params.sigma,
        params.h,
        params.erosion_radius,
        params.dilation_radius,
        params.index
    );

    for path in &cli.tif_paths {
        println!("\nLoading '{}'...", path.display());
        let image = load_multiband_tiff(path)?;
        println!(
            "  {} x {} pixels, {} band(s), {:?} samples",
            image.ncol, image.nrow, image.nbands, image.kind
        );

        let t0 = std::time::Instant::now();
        let seg = segment_crowns(&image, &params)?;
        println!(
            "  Total number of distinct tree crown boundaries: {} ({:.2}s)",
            seg.crown_count,
            t0.elapsed().as_secs_f64()
        );

        if !cli.no_save {
            let mask_path = mask_path_for(path);
            save_mask(&seg.final_mask, &mask_path)?;
            println!("  Saved binary mask to {}", mask_path.display());
            if cli.overlay {
                let overlay_path = mask_path.with_file_name(format!(
                    "{}_overlay.png",
                    mask_path.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default()
                ));
                save_overlay(&seg.overlay, &overlay_path)?;
                println!("  Saved overlay to {}", overlay_path.display());
            }
        }
        if let Some(csv_path) = &cli.crowns {
            export_crowns_csv(&seg.crowns, csv_path)?;
            println!("  {} crown row(s) written to {}", seg.crowns.len(), csv_path.display());
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { LevelFilter::Debug } else { LevelFilter::Warn };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    if cli.tif_paths.is_empty() {
        eprintln!("Error: at least one input image is required.");
        return ExitCode::FAILURE;
    }
    if cli.crowns.is_some() && cli.tif_paths.len() > 1 {
        eprintln!("Error: --crowns accepts a single input image.");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
