use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use flood_vision::core_modules::change_detector::{
    DEFAULT_BRIGHT_THRESHOLD_DB, DEFAULT_DARK_THRESHOLD_DB, DetectorConfig, change_detector,
};
use flood_vision::core_modules::estimator::{self, AreaUnit};
use flood_vision::core_modules::geo_raster::{Coordinate, DEFAULT_NO_DATA, GeoRaster, RasterPair};
use flood_vision::core_modules::mask_renderer;
use std::path::{Path, PathBuf};

/// Backscatter range that 8-bit luminance is stretched onto.
const MIN_DB: f32 = -30.0;
const MAX_DB: f32 = 0.0;

#[derive(Parser, Debug)]
#[command(
    name = "visual_tester",
    version,
    about = "Runs flood change detection over two local grayscale images and writes the damage overlay"
)]
struct Args {
    /// Grayscale image captured before the event.
    before: PathBuf,
    /// Grayscale image captured after the event.
    after: PathBuf,
    /// Where to write the overlay PNG.
    output: PathBuf,
    /// Ground resolution in meters per pixel.
    #[arg(long, default_value_t = 10.0)]
    resolution: f64,
    /// Value per hectare (per square meter with --square-meters).
    #[arg(long, default_value_t = 1.0)]
    value: f64,
    #[arg(long, default_value_t = DEFAULT_BRIGHT_THRESHOLD_DB, allow_hyphen_values = true)]
    bright: f32,
    #[arg(long, default_value_t = DEFAULT_DARK_THRESHOLD_DB, allow_hyphen_values = true)]
    dark: f32,
    #[arg(long)]
    square_meters: bool,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lat: f64,
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    lng: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    // --- 1. Argument Parsing & Setup ---
    let args = Args::parse();
    let coordinate = Coordinate::new(args.lat, args.lng)?;
    let area_unit = if args.square_meters { AreaUnit::SquareMeters } else { AreaUnit::Hectares };
    let detector = DetectorConfig {
        bright_threshold: args.bright,
        dark_threshold: args.dark,
    };

    // --- 2. Image Loading ---
    let before = load_capture(&args.before, coordinate, args.resolution)?;
    let after = load_capture(&args.after, coordinate, args.resolution)?;
    log::info!("Loaded {}x{} captures", before.width(), before.height());

    // --- 3. Detection & Estimation ---
    let mask = change_detector::detect(RasterPair::new(coordinate, before, after), &detector)?;
    let estimate = estimator::estimate(&mask, args.resolution, args.value, area_unit)?;

    // --- 4. Overlay Output ---
    let overlay = mask_renderer::render(&mask)?;
    std::fs::write(&args.output, &overlay.png)
        .with_context(|| format!("writing overlay to {}", args.output.display()))?;

    let unit = if args.square_meters { "m2" } else { "ha" };
    println!("Damaged pixels:  {} of {}", estimate.damaged_pixel_count, estimate.valid_pixel_count);
    println!("Newly bright:    {}", mask.newly_bright_count());
    println!("Damaged area:    {:.4} {unit} of {:.4} {unit}", estimate.damaged_area, estimate.total_area);
    println!("Damage:          {:.2}%", estimate.damage_percent());
    println!("Financial loss:  {:.2}", estimate.financial_loss);
    println!("Processing complete. Overlay saved to {}", args.output.display());
    Ok(())
}

fn load_capture(path: &Path, coordinate: Coordinate, resolution: f64) -> anyhow::Result<GeoRaster> {
    let luma = image::open(path)
        .with_context(|| format!("opening {}", path.display()))?
        .to_luma8();
    let (width, height) = luma.dimensions();
    let samples = luma.pixels().map(|p| luminance_to_db(p.0[0])).collect();
    Ok(GeoRaster::new(
        width,
        height,
        samples,
        coordinate.window(width, height, resolution),
        resolution,
        Utc::now().date_naive(),
        DEFAULT_NO_DATA,
    )?)
}

fn luminance_to_db(luma: u8) -> f32 {
    MIN_DB + (MAX_DB - MIN_DB) * f32::from(luma) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luminance_spans_the_backscatter_range() {
        assert_eq!(luminance_to_db(0), MIN_DB);
        assert_eq!(luminance_to_db(255), MAX_DB);
        let mid = luminance_to_db(110);
        assert!(mid > DEFAULT_DARK_THRESHOLD_DB && mid < DEFAULT_BRIGHT_THRESHOLD_DB);
    }

    #[test]
    fn loads_grayscale_png_as_capture() {
        let tmp = tempfile::TempDir::new().expect("create temp dir");
        let path = tmp.path().join("bright.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([255])).save(&path).unwrap();
        let raster = load_capture(&path, Coordinate::new(0.0, 0.0).unwrap(), 10.0).unwrap();
        assert_eq!((raster.width(), raster.height()), (3, 2));
        assert_eq!(raster.sample(2, 1), Some(MAX_DB));
    }
}
