//! Corpus building from source audio
//!
//! Each source is cut into overlapping windows. A window's feature vector
//! is the mean of `num_frames` analysis frames spread across it, the same
//! averaging the engine applies to the live driver.

use crate::aggregator::FeatureAggregator;
use crate::analysis::{analyze_signal, BandEnergyAnalyzer, FeatureAnalyzer};
use crate::audio::decode_audio;
use crate::config::{BuildConfig, MosaicConfig};
use anyhow::{Context, Result};
use mosaic_corpus::{Corpus, MinMax};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Sample span of one corpus window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowSlice {
    pub start_time: f64,
    pub start_sample: usize,
    pub end_sample: usize,
}

/// Window positions over `num_samples`. Windows that would run past the end
/// are dropped, unless the signal is shorter than one window, in which case
/// the whole signal is a single window.
pub fn slice_windows(num_samples: usize, sample_rate: u32, build: &BuildConfig) -> Vec<WindowSlice> {
    if num_samples == 0 {
        return Vec::new();
    }

    let sr = sample_rate as f64;
    let window = ((build.window_seconds * sr).round() as usize).max(1);
    let hop = ((build.hop_seconds * sr).round() as usize).max(1);

    let mut slices: Vec<WindowSlice> = (0..)
        .map(|i| i * hop)
        .take_while(|start| start + window <= num_samples)
        .map(|start| WindowSlice {
            start_time: start as f64 / sr,
            start_sample: start,
            end_sample: start + window,
        })
        .collect();

    if slices.is_empty() {
        slices.push(WindowSlice {
            start_time: 0.0,
            start_sample: 0,
            end_sample: num_samples,
        });
    }
    slices
}

/// Mean of roughly `num_frames` analysis frames evenly spaced over `segment`.
pub fn window_features(
    analyzer: &mut dyn FeatureAnalyzer,
    segment: &[f32],
    num_frames: usize,
) -> Vec<f32> {
    let hop = segment.len() / num_frames.max(1);
    let frames = analyze_signal(analyzer, segment, hop);

    let mut aggregator = FeatureAggregator::new(analyzer.num_coeffs(), frames.len());
    for frame in &frames {
        aggregator.push(frame);
    }
    aggregator
        .take_query()
        .unwrap_or_else(|| vec![0.0; analyzer.num_coeffs()])
}

/// Analysed windows of one source, in time order.
pub fn analyze_source(
    analyzer: &mut dyn FeatureAnalyzer,
    samples: &[f32],
    sample_rate: u32,
    build: &BuildConfig,
    num_frames: usize,
) -> Vec<(f64, Vec<f32>)> {
    slice_windows(samples.len(), sample_rate, build)
        .into_iter()
        .map(|slice| {
            let segment = &samples[slice.start_sample..slice.end_sample];
            (slice.start_time, window_features(analyzer, segment, num_frames))
        })
        .collect()
}

/// Decode and analyse every source in parallel. Rows are ordered by input
/// file, then by time.
pub fn build_corpus(files: &[PathBuf], config: &MosaicConfig) -> Result<Corpus> {
    let analysis = &config.analysis;

    let sources = files
        .par_iter()
        .map(|path| {
            let name = source_name(path)?;
            let audio = decode_audio(path, analysis.sample_rate)
                .with_context(|| format!("Failed to decode {}", path.display()))?;
            let mut analyzer = BandEnergyAnalyzer::new(analysis);
            let windows = analyze_source(
                &mut analyzer,
                &audio.samples,
                analysis.sample_rate,
                &config.build,
                config.timing.num_frames,
            );
            log::info!("{}: {} windows", name, windows.len());
            Ok((name, windows))
        })
        .collect::<Result<Vec<_>>>()?;

    let num_coeffs = BandEnergyAnalyzer::new(analysis).num_coeffs();
    let total = sources.iter().map(|(_, w)| w.len()).sum();
    let mut corpus = Corpus::with_capacity(num_coeffs, total);
    for (name, windows) in &sources {
        for (start_time, features) in windows {
            corpus.push(name, *start_time, features);
        }
    }

    if corpus.num_points() == 0 {
        anyhow::bail!("No windows could be extracted from {} files", files.len());
    }
    Ok(corpus)
}

fn source_name(path: &Path) -> Result<String> {
    let name = path
        .to_str()
        .with_context(|| format!("Source path is not valid UTF-8: {}", path.display()))?;
    if name.chars().any(char::is_whitespace) {
        anyhow::bail!("Source path contains whitespace: {:?}", name);
    }
    Ok(name.to_string())
}

/// Per-dimension range of the queries the engine would form from `samples`:
/// frames every `hop`, averaged `num_frames` at a time. Only complete cycles
/// count.
pub fn driver_ranges(
    analyzer: &mut dyn FeatureAnalyzer,
    samples: &[f32],
    sample_rate: u32,
    hop: Duration,
    num_frames: usize,
) -> Result<MinMax> {
    let hop_samples = (hop.as_secs_f64() * sample_rate as f64).round() as usize;
    let frames = analyze_signal(analyzer, samples, hop_samples);

    let queries: Vec<Vec<f32>> = frames
        .chunks_exact(num_frames.max(1))
        .map(|cycle| {
            let mut aggregator = FeatureAggregator::new(analyzer.num_coeffs(), cycle.len());
            for frame in cycle {
                aggregator.push(frame);
            }
            aggregator.take_query().unwrap_or_default()
        })
        .collect();

    if queries.is_empty() {
        anyhow::bail!(
            "Driver is too short for one cycle of {} frames ({} frames available)",
            num_frames,
            frames.len()
        );
    }
    log::info!("Driver ranges from {} queries", queries.len());
    Ok(MinMax::from_rows(
        analyzer.num_coeffs(),
        queries.iter().map(Vec::as_slice),
    ))
}
