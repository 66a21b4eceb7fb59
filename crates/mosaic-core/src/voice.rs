//! Voices, their playback seam and the preloaded source audio

use crate::audio::decode_audio;
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Decoded mono audio of one corpus source file.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    pub path: String,
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SourceBuffer {
    /// Sample offset of `seconds` into the buffer.
    pub fn frame_at(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate as f64).round() as u64
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Every corpus source, indexed like [`mosaic_corpus::Corpus::files`].
#[derive(Debug, Clone, Default)]
pub struct SourceBank {
    buffers: Vec<Arc<SourceBuffer>>,
}

impl SourceBank {
    /// Decode every file up front. Any failure aborts the load.
    pub fn load(files: &[String], sample_rate: u32) -> Result<Self> {
        let buffers = files
            .par_iter()
            .map(|path| {
                let audio = decode_audio(Path::new(path), sample_rate)
                    .with_context(|| format!("Failed to load corpus source {}", path))?;
                log::debug!("Loaded source {} ({:.1}s)", path, audio.duration_secs());
                Ok(Arc::new(SourceBuffer {
                    path: path.clone(),
                    samples: audio.samples,
                    sample_rate,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        log::info!("Loaded {} source files", buffers.len());
        Ok(Self { buffers })
    }

    pub fn from_buffers(buffers: Vec<Arc<SourceBuffer>>) -> Self {
        Self { buffers }
    }

    pub fn get(&self, file_index: usize) -> Option<&Arc<SourceBuffer>> {
        self.buffers.get(file_index)
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }
}

/// Playback path a voice drives. Calls are made in trigger order and are
/// never expected to block.
pub trait VoiceOutput: Send {
    fn bind(&mut self, source: Arc<SourceBuffer>);
    /// Jump to a sample offset of the bound source.
    fn seek(&mut self, frame: u64);
    fn set_rate(&mut self, rate: f64);
    /// Move linearly from the current gain to `target` over `duration`.
    fn ramp_gain(&mut self, target: f32, duration: Duration);
    fn start(&mut self);
    fn stop(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoicePhase {
    #[default]
    Idle,
    AttackSustain,
    Release,
}

/// Book-keeping for one pool slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoiceState {
    pub phase: VoicePhase,
    /// Window currently playing.
    pub window: Option<usize>,
    /// Bumped on every trigger; a grain task whose generation is stale has
    /// been stolen and stops touching the voice.
    pub generation: u64,
}

/// Equal spread of `pool_size` voices across `[-spread, spread]`.
pub fn voice_pan(slot: usize, pool_size: usize, spread: f32) -> f32 {
    if pool_size <= 1 {
        return 0.0;
    }
    let t = slot as f32 / (pool_size - 1) as f32;
    -spread + 2.0 * spread * t
}

pub fn voice_delay(slot: usize, delay_spread_ms: f64) -> Duration {
    Duration::from_secs_f64((slot as f64 * delay_spread_ms).max(0.0) / 1000.0)
}
