//! Engine configuration
//!
//! Every section can be given in a TOML file; missing keys fall back to the
//! defaults below. Command-line flags are applied on top by the binaries.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete engine configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MosaicConfig {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub voices: VoiceConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub build: BuildConfig,
}

/// Feature analysis parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default = "default_num_bands")]
    pub num_bands: usize,
    #[serde(default = "default_min_freq")]
    pub min_freq: f32,
    #[serde(default = "default_max_freq")]
    pub max_freq: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_analysis_rate(),
            fft_size: default_fft_size(),
            num_bands: default_num_bands(),
            min_freq: default_min_freq(),
            max_freq: default_max_freq(),
        }
    }
}

fn default_analysis_rate() -> u32 {
    22050
}
fn default_fft_size() -> usize {
    2048
}
fn default_num_bands() -> usize {
    24
}
fn default_min_freq() -> f32 {
    40.0
}
fn default_max_freq() -> f32 {
    10000.0
}

/// Tempo and aggregation window parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_tempo")]
    pub tempo_bpm: f64,
    /// Tempo at which grains play back at their original rate.
    #[serde(default = "default_tempo")]
    pub reference_tempo_bpm: f64,
    #[serde(default = "default_ticks_per_beat")]
    pub ticks_per_beat: u32,
    /// Analysis frames averaged into one query (1..=10).
    #[serde(default = "default_num_frames")]
    pub num_frames: usize,
    /// Scale grain playback rate by `tempo / reference_tempo`.
    #[serde(default)]
    pub tempo_sync: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tempo_bpm: default_tempo(),
            reference_tempo_bpm: default_tempo(),
            ticks_per_beat: default_ticks_per_beat(),
            num_frames: default_num_frames(),
            tempo_sync: false,
        }
    }
}

impl TimingConfig {
    pub fn hop(&self) -> Duration {
        hop_for_tempo(self.tempo_bpm, self.ticks_per_beat)
    }
}

/// Tempos accepted from configuration and live control.
pub const TEMPO_RANGE_BPM: std::ops::RangeInclusive<f64> = 1.0..=1000.0;

/// Whether `tempo_bpm` is finite and inside [`TEMPO_RANGE_BPM`].
pub fn is_valid_tempo(tempo_bpm: f64) -> bool {
    tempo_bpm.is_finite() && TEMPO_RANGE_BPM.contains(&tempo_bpm)
}

/// Duration of one analysis tick at `tempo_bpm`.
///
/// `tempo_bpm` must pass [`is_valid_tempo`] and `ticks_per_beat` must be
/// non-zero; [`MosaicConfig::validate`] and the control path enforce both.
pub fn hop_for_tempo(tempo_bpm: f64, ticks_per_beat: u32) -> Duration {
    Duration::from_secs_f64(60.0 / tempo_bpm / ticks_per_beat as f64)
}

fn default_tempo() -> f64 {
    120.0
}
fn default_ticks_per_beat() -> u32 {
    4
}
fn default_num_frames() -> usize {
    4
}

/// Nearest-neighbour search parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_k")]
    pub k: usize,
    /// Seed for the alternate-grain pick; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            seed: None,
        }
    }
}

fn default_k() -> usize {
    2
}

/// Voice pool and envelope parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VoiceConfig {
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Attack length as a fraction of the grain's window duration.
    #[serde(default = "default_attack_fraction")]
    pub attack_fraction: f64,
    /// Release length as a fraction of the grain's window duration.
    #[serde(default = "default_release_fraction")]
    pub release_fraction: f64,
    #[serde(default = "default_gain")]
    pub gain: f32,
    /// Stereo width voices are spread across (0 = mono centre, 1 = hard L/R).
    #[serde(default = "default_pan_spread")]
    pub pan_spread: f32,
    /// Extra output delay added per voice slot.
    #[serde(default)]
    pub delay_spread_ms: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            pool_size: default_pool_size(),
            attack_fraction: default_attack_fraction(),
            release_fraction: default_release_fraction(),
            gain: default_gain(),
            pan_spread: default_pan_spread(),
            delay_spread_ms: 0.0,
        }
    }
}

fn default_pool_size() -> usize {
    4
}
fn default_attack_fraction() -> f64 {
    0.1
}
fn default_release_fraction() -> f64 {
    0.5
}
fn default_gain() -> f32 {
    0.8
}
fn default_pan_spread() -> f32 {
    0.8
}

/// Renderer synchronization destination
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sync_host")]
    pub host: String,
    #[serde(default = "default_sync_port")]
    pub port: u16,
    #[serde(default = "default_sync_address")]
    pub address: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_sync_host(),
            port: default_sync_port(),
            address: default_sync_address(),
        }
    }
}

impl SyncConfig {
    pub fn destination(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_true() -> bool {
    true
}
fn default_sync_host() -> String {
    "127.0.0.1".to_string()
}
fn default_sync_port() -> u16 {
    9000
}
fn default_sync_address() -> String {
    "/mosaic/window".to_string()
}

/// Rendered output parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_output_path")]
    pub path: String,
    /// Silence kept after the last release.
    #[serde(default = "default_tail_seconds")]
    pub tail_seconds: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_output_rate(),
            path: default_output_path(),
            tail_seconds: default_tail_seconds(),
        }
    }
}

fn default_output_rate() -> u32 {
    44100
}
fn default_output_path() -> String {
    "mosaic.wav".to_string()
}
fn default_tail_seconds() -> f64 {
    2.0
}

/// Corpus builder windowing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BuildConfig {
    #[serde(default = "default_window_seconds")]
    pub window_seconds: f64,
    #[serde(default = "default_build_hop_seconds")]
    pub hop_seconds: f64,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            window_seconds: default_window_seconds(),
            hop_seconds: default_build_hop_seconds(),
        }
    }
}

fn default_window_seconds() -> f64 {
    0.5
}
fn default_build_hop_seconds() -> f64 {
    0.25
}

/// Largest frame count selectable from the control input (digit `0`).
pub const MAX_FRAMES: usize = 10;

impl MosaicConfig {
    /// Load configuration from TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
        let config: MosaicConfig = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML config: {}", e))?;
        Ok(config)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> anyhow::Result<()> {
        let a = &self.analysis;
        if a.sample_rate == 0 {
            anyhow::bail!("analysis.sample_rate must be > 0");
        }
        if !a.fft_size.is_power_of_two() {
            anyhow::bail!("analysis.fft_size must be a power of two");
        }
        if a.num_bands == 0 {
            anyhow::bail!("analysis.num_bands must be > 0");
        }
        if a.min_freq <= 0.0 || a.min_freq >= a.max_freq {
            anyhow::bail!("analysis.min_freq must be > 0 and < max_freq");
        }

        let t = &self.timing;
        if !is_valid_tempo(t.tempo_bpm) || !is_valid_tempo(t.reference_tempo_bpm) {
            anyhow::bail!(
                "tempo values must be in {}..={} bpm",
                TEMPO_RANGE_BPM.start(),
                TEMPO_RANGE_BPM.end()
            );
        }
        if t.ticks_per_beat == 0 {
            anyhow::bail!("timing.ticks_per_beat must be > 0");
        }
        if !(1..=MAX_FRAMES).contains(&t.num_frames) {
            anyhow::bail!("timing.num_frames must be in 1..={}", MAX_FRAMES);
        }

        if self.search.k == 0 {
            anyhow::bail!("search.k must be > 0");
        }

        let v = &self.voices;
        if v.pool_size == 0 {
            anyhow::bail!("voices.pool_size must be > 0");
        }
        if !(0.0..=1.0).contains(&v.attack_fraction) || !(0.0..=1.0).contains(&v.release_fraction)
        {
            anyhow::bail!("envelope fractions must be in [0, 1]");
        }
        if !(0.0..=1.0).contains(&v.pan_spread) {
            anyhow::bail!("voices.pan_spread must be in [0, 1]");
        }
        if v.delay_spread_ms < 0.0 {
            anyhow::bail!("voices.delay_spread_ms must be >= 0");
        }

        if self.output.sample_rate == 0 {
            anyhow::bail!("output.sample_rate must be > 0");
        }

        if !(self.build.window_seconds > 0.0) || !(self.build.hop_seconds > 0.0) {
            anyhow::bail!("build window and hop must be > 0");
        }

        Ok(())
    }
}
