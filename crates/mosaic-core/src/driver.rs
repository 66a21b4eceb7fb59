//! Driver input: the signal whose features steer grain selection

use crate::analysis::FeatureAnalyzer;
use crate::audio::decode_audio;
use anyhow::Result;
use std::path::Path;
use std::time::Duration;

/// Source of one feature frame per analysis tick.
pub trait DriverInput: Send {
    /// Features at the current position, then advance by `hop`.
    /// `None` once the input is exhausted.
    fn next_frame(&mut self, hop: Duration) -> Option<Vec<f32>>;
}

/// Walks a decoded audio file hop by hop.
pub struct FileDriver {
    samples: Vec<f32>,
    sample_rate: u32,
    position: usize,
    analyzer: Box<dyn FeatureAnalyzer>,
}

impl FileDriver {
    pub fn open(path: &Path, sample_rate: u32, analyzer: Box<dyn FeatureAnalyzer>) -> Result<Self> {
        let audio = decode_audio(path, sample_rate)?;
        log::info!(
            "Driver {}: {:.1}s @ {}Hz",
            path.display(),
            audio.duration_secs(),
            audio.sample_rate
        );
        Ok(Self::from_samples(audio.samples, sample_rate, analyzer))
    }

    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: u32,
        analyzer: Box<dyn FeatureAnalyzer>,
    ) -> Self {
        Self {
            samples,
            sample_rate,
            position: 0,
            analyzer,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    pub fn position_secs(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }
}

impl DriverInput for FileDriver {
    fn next_frame(&mut self, hop: Duration) -> Option<Vec<f32>> {
        if self.position >= self.samples.len() {
            return None;
        }

        let end = (self.position + self.analyzer.frame_size()).min(self.samples.len());
        let features = self.analyzer.analyze(&self.samples[self.position..end]);

        let hop_samples = (hop.as_secs_f64() * self.sample_rate as f64).round() as usize;
        self.position += hop_samples.max(1);

        Some(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reports the first sample of each frame.
    struct FirstSample;

    impl FeatureAnalyzer for FirstSample {
        fn num_coeffs(&self) -> usize {
            1
        }
        fn frame_size(&self) -> usize {
            4
        }
        fn analyze(&mut self, frame: &[f32]) -> Vec<f32> {
            vec![frame[0]]
        }
    }

    #[test]
    fn test_frames_advance_by_hop_until_exhausted() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut driver = FileDriver::from_samples(samples, 10, Box::new(FirstSample));

        let hop = Duration::from_millis(300);
        let frames: Vec<f32> = std::iter::from_fn(|| driver.next_frame(hop))
            .map(|f| f[0])
            .collect();

        assert_eq!(frames, vec![0.0, 3.0, 6.0, 9.0]);
        assert!(driver.next_frame(hop).is_none());
    }

    #[test]
    fn test_hop_may_change_between_frames() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32).collect();
        let mut driver = FileDriver::from_samples(samples, 10, Box::new(FirstSample));

        assert_eq!(driver.next_frame(Duration::from_millis(100)), Some(vec![0.0]));
        assert_eq!(driver.next_frame(Duration::from_millis(500)), Some(vec![1.0]));
        assert_eq!(driver.next_frame(Duration::from_millis(100)), Some(vec![6.0]));
        assert!((driver.position_secs() - 0.7).abs() < 1e-9);
    }
}
