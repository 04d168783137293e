//! geobalance CLI - band rewriting and white balance for RGB(A) rasters

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geobalance_algorithms::bands::{locate_band, BandFallback, BandMatch, Resolution};
use geobalance_algorithms::cancel::CancelToken;
use geobalance_algorithms::pipeline::{rewrite_file, white_balance_file};
use geobalance_algorithms::stretch::{FlatBandPolicy, PercentileStretchParams};
use geobalance_algorithms::transform::offset;
use geobalance_core::io::DefaultDriver;
use geobalance_core::{ColorRole, RasterDataset, RasterDriver};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geobalance")]
#[command(author, version, about = "Band rewriting and white balance for RGB(A) rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Stretch red, green and blue between percentiles into an 8-bit RGB raster
    WhiteBalance {
        /// Input raster file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Percentage clipped at each end of every band's distribution
        #[arg(short, long, default_value = "0.6")]
        percent: f64,
        /// Fill value for flat bands instead of failing
        #[arg(long)]
        flat_value: Option<u8>,
        /// Require every color band to declare its role
        #[arg(long)]
        strict_bands: bool,
    },
    /// Rewrite red, green, blue and alpha into a new RGBA raster, adding an offset
    Rewrite {
        /// Input raster file
        input: PathBuf,
        /// Output file
        output: PathBuf,
        /// Value added to every sample
        #[arg(short, long, default_value = "1", allow_hyphen_values = true)]
        offset: i32,
        /// Require every color band to declare its role
        #[arg(long)]
        strict_bands: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn fallback(strict: bool) -> BandFallback {
    if strict {
        BandFallback::Strict
    } else {
        BandFallback::LastBand
    }
}

fn report_fallbacks(roles: &[ColorRole], matches: &[BandMatch]) {
    for (role, m) in roles.iter().zip(matches) {
        if m.resolution == Resolution::Fallback {
            warn!("{} taken from band {} (no band declares it)", role, m.index);
        }
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let driver = DefaultDriver::default();

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let ds = driver.open(&input).context("Failed to read raster")?;
            let (cols, rows) = ds.size();
            let georef = ds.geo_reference().context("Failed to read geo-reference")?;
            let bounds = georef.transform.bounds(cols, rows);

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, cols * rows);
            println!("Pixel type: {}", ds.pixel_type());
            println!(
                "Origin: ({:.6}, {:.6})  Pixel size: ({}, {})",
                georef.transform.origin_x,
                georef.transform.origin_y,
                georef.transform.pixel_width,
                georef.transform.pixel_height
            );
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = &georef.crs {
                println!("CRS: {}", crs);
            }

            println!("\nBands:");
            for band in 1..=ds.band_count() {
                println!("  {}: {}", band, ds.color_role(band)?);
            }

            println!("\nColor bands:");
            for role in ColorRole::RGBA {
                match locate_band(&ds, role, BandFallback::LastBand) {
                    Ok(m) if m.resolution == Resolution::Fallback => {
                        println!("  {}: band {} (fallback)", role, m.index)
                    }
                    Ok(m) => println!("  {}: band {}", role, m.index),
                    Err(_) => println!("  {}: not found", role),
                }
            }
        }

        // ── White balance ────────────────────────────────────────────
        Commands::WhiteBalance {
            input,
            output,
            percent,
            flat_value,
            strict_bands,
        } => {
            let params = PercentileStretchParams {
                percent,
                on_flat: flat_value.map_or(FlatBandPolicy::Fail, FlatBandPolicy::Constant),
            };
            let pb = spinner("Stretching bands...");
            let start = Instant::now();
            let matches = white_balance_file(
                &driver,
                &input,
                &output,
                &params,
                fallback(strict_bands),
                &CancelToken::new(),
            )
            .context("Failed to white balance raster")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            report_fallbacks(&ColorRole::RGB, &matches);
            info!("Clipped {}% at each end", percent);
            done("White balance", &output, elapsed);
        }

        // ── Rewrite ──────────────────────────────────────────────────
        Commands::Rewrite {
            input,
            output,
            offset: delta,
            strict_bands,
        } => {
            let pb = spinner("Rewriting bands...");
            let start = Instant::now();
            let matches = rewrite_file(
                &driver,
                &input,
                &output,
                offset(delta),
                fallback(strict_bands),
                &CancelToken::new(),
            )
            .context("Failed to rewrite raster")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();
            report_fallbacks(&ColorRole::RGBA, &matches);
            done("Rewrite", &output, elapsed);
        }
    }

    Ok(())
}
