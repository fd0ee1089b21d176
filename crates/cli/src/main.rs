//! plyraster CLI - point clouds to digital surface models

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use plyraster_algorithms::rasterize::{
    Dsm, OutputStatistics, PlySource, ProcessingMode, Progress, RasterizeParams, Roi, Statistic,
    rasterize_with,
};
use plyraster_core::CRS;
use plyraster_core::io::{GeoTiffOptions, PlyEncoding, read_ply_header, write_geotiff};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "plyraster")]
#[command(author, version, about = "Rasterize PLY point clouds into digital surface models", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the header of a PLY file and the CRS it declares
    Info {
        /// Input PLY file
        input: PathBuf,
    },
    /// Rasterize one or more PLY files into a GeoTIFF DSM
    Rasterize {
        /// Input PLY files followed by the output DSM path
        #[arg(required = true, num_args = 2.., value_name = "PLY... DSM")]
        paths: Vec<PathBuf>,
        /// Also write the standard deviation to this path
        #[arg(long, value_name = "PATH")]
        std: Option<PathBuf>,
        /// Also write the minimum to this path
        #[arg(long, value_name = "PATH")]
        min: Option<PathBuf>,
        /// Also write the maximum to this path
        #[arg(long, value_name = "PATH")]
        max: Option<PathBuf>,
        /// Cell size in CRS units
        #[arg(short, long, default_value = "1.0")]
        resolution: f64,
        /// Splat radius in cells
        #[arg(long, default_value = "0")]
        radius: usize,
        /// Use a disk footprint instead of a square one
        #[arg(long)]
        circular: bool,
        /// Gaussian influence scale in cells, or "inf" for a plain mean
        #[arg(long, default_value = "inf", value_parser = parse_sigma)]
        sigma: f32,
        /// Explicit extent: xoff,yoff,xsize,ysize (upper-left corner, size in cells)
        #[arg(long, allow_hyphen_values = true)]
        roi: Option<Roi>,
        /// Cells added on every side of the computed extent
        #[arg(long, default_value = "0")]
        pad: usize,
        /// Channel (extra vertex property) to write, 0 being the first after x and y
        #[arg(short, long, default_value = "0")]
        channel: usize,
        /// Worker threads (default: all cores)
        #[arg(short = 'j', long)]
        threads: Option<usize>,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn cloud_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message("computing extent...");
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn write_layer(dsm: &Dsm, stat: Statistic, channel: usize, path: &Path) -> Result<()> {
    let layer = dsm
        .layer(stat, channel)
        .with_context(|| format!("No {} layer for channel {}", stat, channel))?;
    let pb = spinner(&format!("Writing {}...", stat));
    write_geotiff(layer, path, Some(GeoTiffOptions::default()))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    println!("{} saved to: {}", stat, path.display());
    Ok(())
}

fn summarize(dsm: &Dsm, channel: usize) -> Result<()> {
    let avg = dsm
        .layer(Statistic::Mean, channel)
        .context("Missing mean layer")?;
    let (rows, cols) = avg.shape();
    let bounds = avg.bounds();
    let stats = avg.statistics();

    println!("Dimensions: {} x {} ({} cells)", cols, rows, avg.len());
    println!("Cell size: {}", avg.cell_size());
    println!("Transform: {:?}", dsm.transform().to_affine());
    println!(
        "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    if let Some(crs) = dsm.crs() {
        println!("CRS: {}", crs);
    }
    if let (Some(min), Some(max)) = (stats.min, stats.max) {
        println!("Range: {:.3} .. {:.3}", min, max);
    }
    println!(
        "Filled cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / avg.len() as f64
    );
    Ok(())
}

fn done(name: &str, elapsed: std::time::Duration) {
    println!("{} finished", name);
    println!("  Processing time: {:.2?}", elapsed);
}

/// Positive float, or `inf` / `infinite` / `infinity` for an unweighted mean
fn parse_sigma(s: &str) -> std::result::Result<f32, String> {
    match s.trim().to_lowercase().as_str() {
        "inf" | "infinite" | "infinity" => Ok(f32::INFINITY),
        other => {
            let sigma: f32 = other
                .parse()
                .map_err(|_| format!("'{}' is neither a number nor 'inf'", s))?;
            if sigma > 0.0 {
                Ok(sigma)
            } else {
                Err(format!("sigma must be > 0, got {}", sigma))
            }
        }
    }
}

fn encoding_name(encoding: PlyEncoding) -> &'static str {
    match encoding {
        PlyEncoding::Ascii => "ascii",
        PlyEncoding::BinaryLittleEndian => "binary_little_endian",
        PlyEncoding::BinaryBigEndian => "binary_big_endian",
    }
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let header = read_ply_header(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;

            println!("File: {}", input.display());
            println!("Format: {}", encoding_name(header.encoding));
            for element in &header.elements {
                println!("Element '{}': {} entries", element.name, element.count);
                for property in &element.properties {
                    println!("  {}", property.name());
                }
            }
            let columns = header.vertex_columns();
            if columns.len() > 2 {
                println!("Channels: {}", columns[2..].join(", "));
            }
            for comment in &header.comments {
                println!("Comment: {}", comment);
            }
            match CRS::from_ply_comments(&header.comments) {
                Ok(crs) => println!("CRS: {}", crs),
                Err(e) => println!("CRS: unresolved ({})", e),
            }
        }

        // ── Rasterize ────────────────────────────────────────────────
        Commands::Rasterize {
            mut paths,
            std,
            min,
            max,
            resolution,
            radius,
            circular,
            sigma,
            roi,
            pad,
            channel,
            threads,
        } => {
            let output = paths.pop().context("Missing output path")?;
            let sources: Vec<PlySource> = paths.into_iter().map(PlySource::new).collect();

            let params = RasterizeParams {
                resolution,
                radius,
                circular,
                sigma,
                roi,
                pad,
                outputs: OutputStatistics {
                    std: std.is_some(),
                    min: min.is_some(),
                    max: max.is_some(),
                },
                mode: threads.map_or(ProcessingMode::Parallel, ProcessingMode::ParallelWith),
            };
            params.validate().context("Invalid parameters")?;
            info!("Rasterizing {} point clouds", sources.len());

            let start = Instant::now();
            let pb = cloud_bar(sources.len());
            let dsm = rasterize_with(&sources, &params, |event| match event {
                Progress::ExtentComputed { grid } => {
                    pb.set_message(format!("{} x {} grid", grid.xsize, grid.ysize));
                }
                Progress::CloudAccumulated { label, .. } => {
                    pb.set_message(label.to_string());
                    pb.inc(1);
                }
                Progress::Finalized { .. } => pb.set_message("finalized"),
            });
            pb.finish_and_clear();
            let dsm = dsm.context("Rasterization failed")?;
            let elapsed = start.elapsed();

            if channel >= dsm.channels() {
                anyhow::bail!(
                    "Channel {} requested but the clouds carry {} channels",
                    channel,
                    dsm.channels()
                );
            }

            summarize(&dsm, channel)?;
            write_layer(&dsm, Statistic::Mean, channel, &output)?;
            for (stat, path) in [
                (Statistic::StdDev, &std),
                (Statistic::Min, &min),
                (Statistic::Max, &max),
            ] {
                if let Some(path) = path {
                    write_layer(&dsm, stat, channel, path)?;
                }
            }
            done("Rasterization", elapsed);
        }
    }

    Ok(())
}
