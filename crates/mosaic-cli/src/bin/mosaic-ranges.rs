//! mosaic-ranges - record the feature ranges of a driver signal
//!
//! Usage: mosaic-ranges <driver_audio> <output_minmax>

use anyhow::{Context, Result};
use clap::Parser;
use mosaic_cli::output::{print_json, RangesReport};
use mosaic_cli::{init_logging, load_config};
use mosaic_core::audio::decode_audio;
use mosaic_core::builder::driver_ranges;
use mosaic_core::BandEnergyAnalyzer;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mosaic-ranges")]
#[command(about = "Write the min/max of the queries a driver signal produces", long_about = None)]
struct Args {
    /// Driver audio file
    driver_audio: PathBuf,

    /// Output min/max range file
    output_minmax: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(long)]
    tempo: Option<f64>,

    /// Analysis frames averaged per query (1-10)
    #[arg(long)]
    frames: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, log::LevelFilter::Off);

    let mut config = load_config(args.config.as_deref())?;
    if let Some(tempo) = args.tempo {
        config.timing.tempo_bpm = tempo;
    }
    if let Some(frames) = args.frames {
        config.timing.num_frames = frames;
    }
    config.validate()?;

    let rate = config.analysis.sample_rate;
    let audio = decode_audio(&args.driver_audio, rate)?;
    let mut analyzer = BandEnergyAnalyzer::new(&config.analysis);
    let ranges = driver_ranges(
        &mut analyzer,
        &audio.samples,
        rate,
        config.timing.hop(),
        config.timing.num_frames,
    )?;
    ranges
        .write(&args.output_minmax)
        .with_context(|| format!("Failed to write {}", args.output_minmax.display()))?;

    print_json(&RangesReport {
        driver: args.driver_audio,
        output: args.output_minmax,
        num_coeffs: ranges.len(),
        tempo_bpm: config.timing.tempo_bpm,
        num_frames: config.timing.num_frames,
    });
    Ok(())
}
