//! Feature analysis
//!
//! The engine only needs a fixed-length vector per analysis frame. The
//! bundled analyzer reports log band energies of a Hann-windowed FFT over
//! logarithmically spaced bands, the same band layout a constant-Q
//! filterbank approximation uses.

use crate::config::AnalysisConfig;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// Floor added to band energies before taking the log.
const ENERGY_FLOOR: f32 = 1e-10;

/// Produces one fixed-length feature vector per analysis frame.
pub trait FeatureAnalyzer: Send {
    /// Length of every vector returned by [`FeatureAnalyzer::analyze`].
    fn num_coeffs(&self) -> usize;

    /// Number of samples consumed per frame. Shorter frames are zero-padded.
    fn frame_size(&self) -> usize;

    fn analyze(&mut self, frame: &[f32]) -> Vec<f32>;
}

/// Run the analyzer once on silence and report the width it produces.
pub fn probe_dimensions(analyzer: &mut dyn FeatureAnalyzer) -> usize {
    let silence = vec![0.0; analyzer.frame_size()];
    analyzer.analyze(&silence).len()
}

/// Fail unless the corpus and the live analyzer agree on dimensionality.
pub fn ensure_dimensions(corpus_coeffs: usize, analyzer_coeffs: usize) -> anyhow::Result<()> {
    if corpus_coeffs != analyzer_coeffs {
        anyhow::bail!(
            "Corpus has {} coefficients per window but the analyzer produces {}",
            corpus_coeffs,
            analyzer_coeffs
        );
    }
    Ok(())
}

/// Analyse `samples` every `hop` samples, starting at 0.
pub fn analyze_signal(analyzer: &mut dyn FeatureAnalyzer, samples: &[f32], hop: usize) -> Vec<Vec<f32>> {
    let hop = hop.max(1);
    (0..samples.len())
        .step_by(hop)
        .map(|start| {
            let end = (start + analyzer.frame_size()).min(samples.len());
            analyzer.analyze(&samples[start..end])
        })
        .collect()
}

/// Log energy in logarithmically spaced FFT bands.
pub struct BandEnergyAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    /// Half-open FFT bin range per band
    bands: Vec<(usize, usize)>,
    buffer: Vec<Complex<f32>>,
}

impl BandEnergyAnalyzer {
    pub fn new(config: &AnalysisConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);

        Self {
            fft,
            fft_size: config.fft_size,
            window: create_hann_window(config.fft_size),
            bands: band_bins(config),
            buffer: vec![Complex::new(0.0, 0.0); config.fft_size],
        }
    }
}

impl FeatureAnalyzer for BandEnergyAnalyzer {
    fn num_coeffs(&self) -> usize {
        self.bands.len()
    }

    fn frame_size(&self) -> usize {
        self.fft_size
    }

    fn analyze(&mut self, frame: &[f32]) -> Vec<f32> {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        self.bands
            .iter()
            .map(|&(lo, hi)| {
                let energy: f32 = self.buffer[lo..hi].iter().map(|c| c.norm_sqr()).sum();
                let mean = energy / (hi - lo) as f32;
                10.0 * (mean + ENERGY_FLOOR).log10()
            })
            .collect()
    }
}

/// Map `num_bands` log-spaced bands between `min_freq` and `max_freq` onto
/// FFT bins. Every band covers at least one bin.
fn band_bins(config: &AnalysisConfig) -> Vec<(usize, usize)> {
    let nyquist_bin = config.fft_size / 2;
    let max_freq = config.max_freq.min(config.sample_rate as f32 / 2.0);
    let ratio = max_freq / config.min_freq;
    let bin_of = |freq: f32| {
        ((freq * config.fft_size as f32 / config.sample_rate as f32).round() as usize)
            .clamp(1, nyquist_bin)
    };

    (0..config.num_bands)
        .map(|band| {
            let lo_freq = config.min_freq * ratio.powf(band as f32 / config.num_bands as f32);
            let hi_freq = config.min_freq * ratio.powf((band + 1) as f32 / config.num_bands as f32);
            let lo = bin_of(lo_freq).min(nyquist_bin - 1);
            let hi = bin_of(hi_freq).max(lo + 1);
            (lo, hi)
        })
        .collect()
}

/// Create Hann window
fn create_hann_window(size: usize) -> Vec<f32> {
    if size < 2 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| {
            let x = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * PI * x).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_window() {
        let window = create_hann_window(512);
        assert_eq!(window.len(), 512);
        assert!((window[0] - 0.0).abs() < 0.001);
        assert!((window[256] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_probe_matches_band_count() {
        let config = AnalysisConfig::default();
        let mut analyzer = BandEnergyAnalyzer::new(&config);
        assert_eq!(probe_dimensions(&mut analyzer), config.num_bands);
        assert_eq!(analyzer.num_coeffs(), config.num_bands);
    }

    #[test]
    fn test_bands_are_ordered_and_non_empty() {
        let config = AnalysisConfig::default();
        let bands = band_bins(&config);
        for &(lo, hi) in &bands {
            assert!(hi > lo);
            assert!(hi <= config.fft_size / 2);
        }
        for pair in bands.windows(2) {
            assert!(pair[1].0 >= pair[0].0);
        }
    }

    #[test]
    fn test_sine_peaks_in_its_band() {
        let config = AnalysisConfig::default();
        let mut analyzer = BandEnergyAnalyzer::new(&config);
        let features = analyzer.analyze(&sine(1000.0, config.sample_rate, config.fft_size));

        let bands = band_bins(&config);
        let bin = (1000.0 * config.fft_size as f32 / config.sample_rate as f32).round() as usize;
        let expected = bands
            .iter()
            .position(|&(lo, hi)| bin >= lo && bin < hi)
            .unwrap();

        let loudest = features
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(loudest, expected);
    }

    #[test]
    fn test_analyze_signal_frame_count() {
        let config = AnalysisConfig::default();
        let mut analyzer = BandEnergyAnalyzer::new(&config);
        let frames = analyze_signal(&mut analyzer, &vec![0.0; 1000], 256);
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.len() == config.num_bands));
    }

    #[test]
    fn test_dimension_check() {
        assert!(ensure_dimensions(24, 24).is_ok());
        assert!(ensure_dimensions(13, 24).is_err());
    }
}
