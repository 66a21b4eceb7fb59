//! mosaic-normalize - rescale a corpus model file to unit ranges
//!
//! Usage: mosaic-normalize <input_model> [--output <path>] [--minmax <path>]

use anyhow::{Context, Result};
use clap::Parser;
use mosaic_cli::init_logging;
use mosaic_cli::output::print_json;
use mosaic_corpus::{default_output_paths, normalize_corpus_to};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mosaic-normalize")]
#[command(about = "Normalize every feature dimension of a corpus model file to [0, 1]", long_about = None)]
struct Args {
    /// Input model file
    input: PathBuf,

    /// Normalized model file [default: <stem>_normalized.<ext>]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Min/max range file [default: <stem>_minmax.txt]
    #[arg(short, long)]
    minmax: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, log::LevelFilter::Off);

    let (default_output, default_minmax) = default_output_paths(&args.input);
    let output = args.output.unwrap_or(default_output);
    let minmax = args.minmax.unwrap_or(default_minmax);

    let outcome = normalize_corpus_to(&args.input, &output, &minmax)
        .with_context(|| format!("Failed to normalize {}", args.input.display()))?;

    print_json(&outcome);
    Ok(())
}
