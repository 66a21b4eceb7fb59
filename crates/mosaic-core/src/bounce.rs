//! Offline mixdown of voice activity
//!
//! Every [`BounceVoice`] call is stamped with the engine clock and stored on
//! a shared timeline. [`Bounce::render`] replays the timeline into a stereo
//! buffer: equal-power pan and a fixed delay per voice, linearly
//! interpolated playback at the voice rate and linear gain ramps.

use crate::voice::{SourceBuffer, VoiceOutput};
use anyhow::{Context, Result};
use serde::Serialize;
use std::f32::consts::FRAC_PI_4;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum EventKind {
    Bind(Arc<SourceBuffer>),
    Seek(u64),
    Rate(f64),
    Gain { target: f32, ramp: Duration },
    Start,
    Stop,
}

#[derive(Debug, Clone)]
struct VoiceEvent {
    at: Duration,
    voice: usize,
    kind: EventKind,
}

#[derive(Debug, Clone, Copy)]
struct Route {
    left: f32,
    right: f32,
    delay: Duration,
}

#[derive(Debug, Default)]
struct Timeline {
    routes: Vec<Route>,
    events: Vec<VoiceEvent>,
}

fn lock(timeline: &Mutex<Timeline>) -> MutexGuard<'_, Timeline> {
    timeline.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Serialize)]
pub struct BounceSummary {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub frames: usize,
    pub duration_secs: f64,
    pub peak: f32,
    pub events: usize,
}

#[derive(Debug, Clone)]
pub struct Bounce {
    timeline: Arc<Mutex<Timeline>>,
    sample_rate: u32,
    origin: Instant,
}

impl Bounce {
    /// Starts the bounce clock now.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            timeline: Arc::default(),
            sample_rate,
            origin: Instant::now(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Register a voice. `pan` runs from -1 (left) to 1 (right).
    pub fn voice(&self, pan: f32, delay: Duration) -> BounceVoice {
        let angle = (pan.clamp(-1.0, 1.0) + 1.0) * FRAC_PI_4;
        let mut timeline = lock(&self.timeline);
        timeline.routes.push(Route {
            left: angle.cos(),
            right: angle.sin(),
            delay,
        });
        BounceVoice {
            index: timeline.routes.len() - 1,
            timeline: Arc::clone(&self.timeline),
            origin: self.origin,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.origin.elapsed()
    }

    pub fn num_events(&self) -> usize {
        lock(&self.timeline).events.len()
    }

    /// Interleaved stereo mix of `length`.
    pub fn render(&self, length: Duration) -> Vec<f32> {
        let timeline = lock(&self.timeline);
        let sr = self.sample_rate as f64;
        let total = (length.as_secs_f64() * sr).round() as usize;
        let mut out = vec![0.0f32; total * 2];

        for (index, route) in timeline.routes.iter().enumerate() {
            let delay = (route.delay.as_secs_f64() * sr).round() as usize;
            let mut player = Player::new(*route, self.sample_rate);
            let mut cursor = 0;

            for event in timeline.events.iter().filter(|e| e.voice == index) {
                let at = ((event.at.as_secs_f64() * sr).round() as usize + delay).min(total);
                player.render(&mut out, cursor, at);
                cursor = at;
                player.apply(&event.kind, at);
            }
            player.render(&mut out, cursor, total);
        }

        out
    }

    /// Render everything recorded so far plus `tail` and write a 32-bit float
    /// stereo WAV.
    pub fn write_wav(&self, path: &Path, tail: Duration) -> Result<BounceSummary> {
        let length = self.elapsed() + tail;
        let samples = self.render(length);

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: self.sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        for &sample in &samples {
            writer.write_sample(sample)?;
        }
        writer
            .finalize()
            .with_context(|| format!("Failed to finalize output file: {}", path.display()))?;

        let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        if peak > 1.0 {
            log::warn!("Mix peaks at {:.2}; lower voices.gain to avoid clipping", peak);
        }

        let frames = samples.len() / 2;
        log::info!("Wrote {} ({:.1}s)", path.display(), length.as_secs_f64());
        Ok(BounceSummary {
            path: path.to_path_buf(),
            sample_rate: self.sample_rate,
            frames,
            duration_secs: frames as f64 / self.sample_rate as f64,
            peak,
            events: self.num_events(),
        })
    }

    #[cfg(test)]
    fn push(&self, voice: usize, at: Duration, kind: EventKind) {
        lock(&self.timeline).events.push(VoiceEvent { at, voice, kind });
    }
}

/// Per-voice playback state while rendering.
struct Player {
    route: Route,
    out_rate: f64,
    source: Option<Arc<SourceBuffer>>,
    position: f64,
    rate: f64,
    playing: bool,
    gain_from: f32,
    gain_to: f32,
    ramp_start: usize,
    ramp_len: usize,
}

impl Player {
    fn new(route: Route, sample_rate: u32) -> Self {
        Self {
            route,
            out_rate: sample_rate as f64,
            source: None,
            position: 0.0,
            rate: 1.0,
            playing: false,
            gain_from: 0.0,
            gain_to: 0.0,
            ramp_start: 0,
            ramp_len: 0,
        }
    }

    fn gain_at(&self, n: usize) -> f32 {
        let elapsed = n.saturating_sub(self.ramp_start);
        if elapsed >= self.ramp_len {
            return self.gain_to;
        }
        let t = elapsed as f32 / self.ramp_len as f32;
        self.gain_from + (self.gain_to - self.gain_from) * t
    }

    fn apply(&mut self, kind: &EventKind, at: usize) {
        match kind {
            EventKind::Bind(source) => {
                self.source = Some(Arc::clone(source));
                self.position = 0.0;
            }
            EventKind::Seek(frame) => self.position = *frame as f64,
            EventKind::Rate(rate) => self.rate = *rate,
            EventKind::Gain { target, ramp } => {
                self.gain_from = self.gain_at(at);
                self.gain_to = *target;
                self.ramp_start = at;
                self.ramp_len = (ramp.as_secs_f64() * self.out_rate).round() as usize;
            }
            EventKind::Start => self.playing = true,
            EventKind::Stop => self.playing = false,
        }
    }

    /// Mix output frames `from..to` into `out`.
    fn render(&mut self, out: &mut [f32], from: usize, to: usize) {
        if !self.playing {
            return;
        }
        let Some(source) = self.source.clone() else {
            return;
        };
        let samples = &source.samples;
        let step = self.rate * source.sample_rate as f64 / self.out_rate;

        for n in from..to {
            let index = self.position as usize;
            if self.position < 0.0 || index >= samples.len() {
                self.playing = false;
                return;
            }
            let frac = (self.position - index as f64) as f32;
            let value = match samples.get(index + 1) {
                Some(&next) => samples[index] + (next - samples[index]) * frac,
                None => samples[index],
            };

            let v = value * self.gain_at(n);
            out[2 * n] += v * self.route.left;
            out[2 * n + 1] += v * self.route.right;
            self.position += step;
        }
    }
}

/// A voice output that records onto a [`Bounce`] timeline.
pub struct BounceVoice {
    index: usize,
    timeline: Arc<Mutex<Timeline>>,
    origin: Instant,
}

impl BounceVoice {
    fn record(&self, kind: EventKind) {
        lock(&self.timeline).events.push(VoiceEvent {
            at: self.origin.elapsed(),
            voice: self.index,
            kind,
        });
    }
}

impl VoiceOutput for BounceVoice {
    fn bind(&mut self, source: Arc<SourceBuffer>) {
        self.record(EventKind::Bind(source));
    }

    fn seek(&mut self, frame: u64) {
        self.record(EventKind::Seek(frame));
    }

    fn set_rate(&mut self, rate: f64) {
        self.record(EventKind::Rate(rate));
    }

    fn ramp_gain(&mut self, target: f32, duration: Duration) {
        self.record(EventKind::Gain {
            target,
            ramp: duration,
        });
    }

    fn start(&mut self) {
        self.record(EventKind::Start);
    }

    fn stop(&mut self) {
        self.record(EventKind::Stop);
    }
}
