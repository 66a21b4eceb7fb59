//! mosaic - real-time audio mosaicing engine
//!
//! Usage: mosaic <features> [driver] [corpus_minmax driver_minmax]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use mosaic_cli::output::{print_json, MosaicReport};
use mosaic_cli::{check_corpus, init_logging, load_config, CorpusCheck};
use mosaic_core::control::control_channel;
use mosaic_core::keyboard::spawn_stdin_reader;
use mosaic_core::voice::{voice_delay, voice_pan};
use mosaic_core::{
    Bounce, Engine, FileDriver, GrainScheduler, MosaicConfig, NullSync, OscSync, SourceBank,
    SyncEmitter, VoiceOutput,
};
use std::io::{BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "mosaic")]
#[command(about = "Play corpus grains chosen by the features of a driver signal", long_about = None)]
struct Args {
    /// Corpus model file
    features: Option<PathBuf>,

    /// Driver audio file
    driver: Option<PathBuf>,

    /// Corpus min/max range file
    corpus_minmax: Option<PathBuf>,

    /// Driver min/max range file
    driver_minmax: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Tempo in beats per minute
    #[arg(long)]
    tempo: Option<f64>,

    /// Analysis frames averaged per query (1-10)
    #[arg(long)]
    frames: Option<usize>,

    /// Number of voices
    #[arg(long)]
    pool_size: Option<usize>,

    /// Nearest neighbours to choose the played grain from
    #[arg(short)]
    k: Option<usize>,

    /// Seed for the grain choice
    #[arg(long)]
    seed: Option<u64>,

    /// Output WAV file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Render as fast as possible instead of in real time
    #[arg(long)]
    offline: bool,

    /// Do not send sync messages
    #[arg(long)]
    no_sync: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose, log::LevelFilter::Warn);

    let Some(features) = args.features.clone() else {
        Args::command().print_help()?;
        println!();
        return Ok(());
    };

    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;
    config.validate()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(args.offline)
        .build()
        .context("Failed to start runtime")?;

    let report = runtime.block_on(run_mosaic(&args, &features, config));
    // Stdin reads cannot be cancelled; do not wait for them.
    runtime.shutdown_background();

    print_json(&report?);
    Ok(())
}

fn apply_overrides(config: &mut MosaicConfig, args: &Args) -> Result<()> {
    match args.tempo {
        Some(tempo) => config.timing.tempo_bpm = tempo,
        None if args.driver.is_some() && !args.offline && std::io::stdin().is_terminal() => {
            if let Some(tempo) = prompt_tempo(config.timing.tempo_bpm)? {
                config.timing.tempo_bpm = tempo;
            }
        }
        None => {}
    }
    if let Some(frames) = args.frames {
        config.timing.num_frames = frames;
    }
    if let Some(pool_size) = args.pool_size {
        config.voices.pool_size = pool_size;
    }
    if let Some(k) = args.k {
        config.search.k = k;
    }
    if args.seed.is_some() {
        config.search.seed = args.seed;
    }
    if let Some(output) = &args.output {
        config.output.path = output.to_string_lossy().into_owned();
    }
    if args.no_sync {
        config.sync.enabled = false;
    }
    Ok(())
}

fn prompt_tempo(default: f64) -> Result<Option<f64>> {
    eprint!("Tempo in bpm [{}]: ", default);
    std::io::stderr().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let tempo: f64 = line
        .parse()
        .with_context(|| format!("Invalid tempo: {:?}", line))?;
    Ok(Some(tempo))
}

async fn run_mosaic(args: &Args, features: &Path, config: MosaicConfig) -> Result<MosaicReport> {
    let check = check_corpus(
        features,
        args.corpus_minmax.as_deref(),
        args.driver_minmax.as_deref(),
        &config,
    )?;
    let mut report = check.report(args.driver.as_deref(), args.offline);

    let Some(driver_path) = &args.driver else {
        log::warn!("No driver given; corpus checked, nothing to play");
        return Ok(report);
    };

    let CorpusCheck {
        corpus,
        analyzer,
        normalizer,
        index,
        ..
    } = check;

    let driver = FileDriver::open(driver_path, config.analysis.sample_rate, Box::new(analyzer))?;
    let bank = SourceBank::load(&corpus.files, config.output.sample_rate)?;

    let sync: Arc<dyn SyncEmitter> = if config.sync.enabled {
        Arc::new(OscSync::connect(&config.sync)?)
    } else {
        Arc::new(NullSync)
    };

    let voices = &config.voices;
    let bounce = Bounce::new(config.output.sample_rate);
    let outputs = (0..voices.pool_size)
        .map(|slot| {
            let voice = bounce.voice(
                voice_pan(slot, voices.pool_size, voices.pan_spread),
                voice_delay(slot, voices.delay_spread_ms),
            );
            Box::new(voice) as Box<dyn VoiceOutput>
        })
        .collect();
    let scheduler = GrainScheduler::new(
        outputs,
        Arc::new(corpus),
        Arc::new(bank),
        sync,
        voices.clone(),
    );

    let (tx, rx) = control_channel();
    let keyboard = if args.offline {
        None
    } else {
        eprintln!("Keys: 1-9/0 frames per query, t <bpm> tempo, q quit (press Enter)");
        Some(spawn_stdin_reader(tx))
    };

    let engine = Engine::new(config.clone(), index, normalizer, scheduler, Box::new(driver), rx);
    let stats = engine.run().await;
    if let Some(keyboard) = keyboard {
        keyboard.abort();
    }

    let summary = bounce.write_wav(
        Path::new(&config.output.path),
        Duration::from_secs_f64(config.output.tail_seconds),
    )?;

    report.run = Some(stats);
    report.output = Some(summary);
    Ok(report)
}
