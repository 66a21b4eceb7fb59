//! mosaic-build - analyse source audio into a corpus model file
//!
//! Usage: mosaic-build <output_model> <audio>...

use anyhow::{Context, Result};
use clap::Parser;
use mosaic_cli::output::{print_json, BuildReport};
use mosaic_cli::{init_logging, load_config};
use mosaic_core::builder::build_corpus;
use mosaic_corpus::CorpusWriter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mosaic-build")]
#[command(about = "Build a corpus model file from audio sources", long_about = None)]
struct Args {
    /// Output model file
    output_model: PathBuf,

    /// Source audio files
    #[arg(required = true)]
    audio: Vec<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Window length in seconds
    #[arg(long)]
    window: Option<f64>,

    /// Window hop in seconds
    #[arg(long)]
    hop: Option<f64>,

    /// Analysis frames averaged per window
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
    if let Some(window) = args.window {
        config.build.window_seconds = window;
    }
    if let Some(hop) = args.hop {
        config.build.hop_seconds = hop;
    }
    if let Some(frames) = args.frames {
        config.timing.num_frames = frames;
    }
    config.validate()?;

    let start = std::time::Instant::now();
    let corpus = build_corpus(&args.audio, &config)?;
    CorpusWriter::write(&args.output_model, &corpus)
        .with_context(|| format!("Failed to write {}", args.output_model.display()))?;

    print_json(&BuildReport {
        output: args.output_model,
        files: corpus.files.len(),
        windows: corpus.num_points(),
        num_coeffs: corpus.num_coeffs(),
        window_seconds: config.build.window_seconds,
        hop_seconds: config.build.hop_seconds,
        created_at: chrono::Utc::now().to_rfc3339(),
        elapsed_secs: start.elapsed().as_secs_f64(),
    });
    Ok(())
}
