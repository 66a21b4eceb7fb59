//! Grain scheduler and voice pool
//!
//! Voices are handed out round-robin. A trigger on a voice that is still
//! sounding steals it: the previous grain's task notices its generation is
//! stale and leaves the voice alone from then on.

use crate::config::VoiceConfig;
use crate::envelope::GrainEnvelope;
use crate::sync::SyncEmitter;
use crate::voice::{SourceBank, VoiceOutput, VoicePhase, VoiceState};
use mosaic_corpus::Corpus;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error("window {0} is not in the corpus")]
    UnknownWindow(usize),

    #[error("source file {file_index} of window {window} is not loaded")]
    MissingSource { window: usize, file_index: usize },
}

/// Per-trigger timing, taken from the cycle that chose the grain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainSpec {
    pub frames: usize,
    pub hop: Duration,
    /// Playback rate, 1.0 for the original speed.
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trigger {
    pub slot: usize,
    pub selected_id: usize,
    pub window_id: usize,
    pub stolen: bool,
}

struct Voice {
    state: Mutex<VoiceState>,
    output: Mutex<Box<dyn VoiceOutput>>,
}

impl Voice {
    /// Run `f` if `generation` still owns the voice. State is locked before
    /// output, here and in [`GrainScheduler::trigger`].
    fn with_current<F>(&self, generation: u64, f: F) -> bool
    where
        F: FnOnce(&mut VoiceState, &mut Box<dyn VoiceOutput>),
    {
        let mut state = lock(&self.state);
        if state.generation != generation {
            return false;
        }
        let mut output = lock(&self.output);
        f(&mut state, &mut output);
        true
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct GrainScheduler {
    voices: Vec<Arc<Voice>>,
    next_slot: usize,
    corpus: Arc<Corpus>,
    bank: Arc<SourceBank>,
    sync: Arc<dyn SyncEmitter>,
    config: VoiceConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl GrainScheduler {
    /// One voice per output. Panics on an empty pool.
    pub fn new(
        outputs: Vec<Box<dyn VoiceOutput>>,
        corpus: Arc<Corpus>,
        bank: Arc<SourceBank>,
        sync: Arc<dyn SyncEmitter>,
        config: VoiceConfig,
    ) -> Self {
        assert!(!outputs.is_empty(), "voice pool must not be empty");
        let voices = outputs
            .into_iter()
            .map(|output| {
                Arc::new(Voice {
                    state: Mutex::new(VoiceState::default()),
                    output: Mutex::new(output),
                })
            })
            .collect();

        Self {
            voices,
            next_slot: 0,
            corpus,
            bank,
            sync,
            config,
            tasks: Vec::new(),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.voices.len()
    }

    pub fn voice_state(&self, slot: usize) -> Option<VoiceState> {
        self.voices.get(slot).map(|v| *lock(&v.state))
    }

    /// Start `alternate_id` on the next voice. The grain's envelope and sync
    /// messages run on a spawned task; this returns immediately.
    pub fn trigger(
        &mut self,
        selected_id: usize,
        alternate_id: usize,
        spec: GrainSpec,
    ) -> Result<Trigger, TriggerError> {
        let window = *self
            .corpus
            .window(alternate_id)
            .ok_or(TriggerError::UnknownWindow(alternate_id))?;
        let source = self
            .bank
            .get(window.source_file_index)
            .ok_or(TriggerError::MissingSource {
                window: alternate_id,
                file_index: window.source_file_index,
            })?
            .clone();

        let slot = self.next_slot;
        self.next_slot = (slot + 1) % self.voices.len();
        let voice = Arc::clone(&self.voices[slot]);
        let envelope = GrainEnvelope::new(spec.hop, spec.frames, &self.config);

        let (generation, stolen) = {
            let mut state = lock(&voice.state);
            let stolen = state.phase != VoicePhase::Idle;
            if stolen {
                log::debug!(
                    "Stealing voice {} from window {:?} ({:?})",
                    slot,
                    state.window,
                    state.phase
                );
            }
            state.generation += 1;
            state.phase = VoicePhase::AttackSustain;
            state.window = Some(alternate_id);

            let mut output = lock(&voice.output);
            if stolen {
                output.stop();
            }
            output.bind(Arc::clone(&source));
            output.seek(source.frame_at(window.start_time));
            output.set_rate(spec.rate);
            output.ramp_gain(0.0, Duration::ZERO);
            output.start();
            output.ramp_gain(envelope.gain, envelope.attack);

            (state.generation, stolen)
        };

        log::debug!(
            "Voice {} <- window {} ({} @ {:.3}s, selected {})",
            slot,
            alternate_id,
            source.path,
            window.start_time,
            selected_id
        );

        self.tasks.retain(|task| !task.is_finished());
        self.tasks.push(tokio::spawn(run_grain(
            voice,
            generation,
            alternate_id,
            spec,
            envelope,
            Arc::clone(&self.sync),
        )));

        Ok(Trigger {
            slot,
            selected_id,
            window_id: alternate_id,
            stolen,
        })
    }

    /// Wait for every grain still sounding.
    pub async fn drain(&mut self) {
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                log::warn!("Grain task failed: {}", e);
            }
        }
    }
}

async fn run_grain(
    voice: Arc<Voice>,
    generation: u64,
    window: usize,
    spec: GrainSpec,
    envelope: GrainEnvelope,
    sync: Arc<dyn SyncEmitter>,
) {
    let start = Instant::now();
    let frames = spec.frames.max(1);

    sync.emit(window, 0.0);
    for frame in 1..=frames {
        sleep_until(start + spec.hop * frame as u32).await;
        if lock(&voice.state).generation != generation {
            return;
        }
        sync.emit(window, frame as f32 / frames as f32);
    }

    let releasing = voice.with_current(generation, |state, output| {
        state.phase = VoicePhase::Release;
        output.ramp_gain(0.0, envelope.release);
    });
    if !releasing {
        return;
    }

    sleep_until(start + envelope.total()).await;
    voice.with_current(generation, |state, output| {
        output.stop();
        state.phase = VoicePhase::Idle;
        state.window = None;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::SourceBuffer;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Bind(String),
        Seek(u64),
        Rate(f64),
        Gain(f32, Duration),
        Start,
        Stop,
    }

    type Log<T> = Arc<Mutex<Vec<(Duration, T)>>>;

    struct RecordingVoice {
        slot: usize,
        origin: Instant,
        calls: Log<(usize, Call)>,
    }

    impl RecordingVoice {
        fn record(&self, call: Call) {
            self.calls
                .lock()
                .unwrap()
                .push((self.origin.elapsed(), (self.slot, call)));
        }
    }

    impl VoiceOutput for RecordingVoice {
        fn bind(&mut self, source: Arc<SourceBuffer>) {
            self.record(Call::Bind(source.path.clone()));
        }
        fn seek(&mut self, frame: u64) {
            self.record(Call::Seek(frame));
        }
        fn set_rate(&mut self, rate: f64) {
            self.record(Call::Rate(rate));
        }
        fn ramp_gain(&mut self, target: f32, duration: Duration) {
            self.record(Call::Gain(target, duration));
        }
        fn start(&mut self) {
            self.record(Call::Start);
        }
        fn stop(&mut self) {
            self.record(Call::Stop);
        }
    }

    struct RecordingSync {
        origin: Instant,
        messages: Log<(usize, f32)>,
    }

    impl SyncEmitter for RecordingSync {
        fn emit(&self, window: usize, progress: f32) {
            self.messages
                .lock()
                .unwrap()
                .push((self.origin.elapsed(), (window, progress)));
        }
    }

    struct Fixture {
        scheduler: GrainScheduler,
        calls: Log<(usize, Call)>,
        messages: Log<(usize, f32)>,
    }

    fn fixture(pool_size: usize) -> Fixture {
        let origin = Instant::now();
        let calls: Log<(usize, Call)> = Arc::default();
        let messages: Log<(usize, f32)> = Arc::default();

        let mut corpus = Corpus::new(1);
        corpus.push("a.wav", 0.0, &[0.0]);
        corpus.push("a.wav", 1.0, &[1.0]);
        corpus.push("b.wav", 0.5, &[2.0]);

        let bank = SourceBank::from_buffers(
            ["a.wav", "b.wav"]
                .iter()
                .map(|path| {
                    Arc::new(SourceBuffer {
                        path: path.to_string(),
                        samples: vec![0.0; 400],
                        sample_rate: 100,
                    })
                })
                .collect(),
        );

        let outputs = (0..pool_size)
            .map(|slot| {
                Box::new(RecordingVoice {
                    slot,
                    origin,
                    calls: Arc::clone(&calls),
                }) as Box<dyn VoiceOutput>
            })
            .collect();
        let sync = Arc::new(RecordingSync {
            origin,
            messages: Arc::clone(&messages),
        });

        let config = VoiceConfig {
            pool_size,
            attack_fraction: 0.1,
            release_fraction: 0.5,
            gain: 0.8,
            ..VoiceConfig::default()
        };

        Fixture {
            scheduler: GrainScheduler::new(outputs, Arc::new(corpus), Arc::new(bank), sync, config),
            calls,
            messages,
        }
    }

    fn spec() -> GrainSpec {
        GrainSpec {
            frames: 4,
            hop: Duration::from_millis(100),
            rate: 1.0,
        }
    }

    fn ms(d: Duration) -> u128 {
        d.as_millis()
    }

    #[tokio::test(start_paused = true)]
    async fn test_rotation_period_is_pool_size() {
        let mut fx = fixture(3);
        let slots: Vec<usize> = (0..7)
            .map(|_| fx.scheduler.trigger(0, 0, spec()).unwrap().slot)
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2, 0]);
        fx.scheduler.drain().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_grain_envelope_and_sync_timing() {
        let mut fx = fixture(1);
        let trigger = fx.scheduler.trigger(0, 1, spec()).unwrap();
        assert_eq!(trigger.window_id, 1);
        assert!(!trigger.stolen);
        assert_eq!(
            fx.scheduler.voice_state(0).unwrap().phase,
            VoicePhase::AttackSustain
        );

        fx.scheduler.drain().await;

        let messages: Vec<(u128, usize, f32)> = fx
            .messages
            .lock()
            .unwrap()
            .iter()
            .map(|&(at, (w, p))| (ms(at), w, p))
            .collect();
        assert_eq!(
            messages,
            vec![
                (0, 1, 0.0),
                (100, 1, 0.25),
                (200, 1, 0.5),
                (300, 1, 0.75),
                (400, 1, 1.0)
            ]
        );

        let calls: Vec<(u128, Call)> = fx
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(at, (_, call))| (ms(*at), call.clone()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (0, Call::Bind("a.wav".into())),
                (0, Call::Seek(100)),
                (0, Call::Rate(1.0)),
                (0, Call::Gain(0.0, Duration::ZERO)),
                (0, Call::Start),
                (0, Call::Gain(0.8, Duration::from_millis(40))),
                (400, Call::Gain(0.0, Duration::from_millis(200))),
                (600, Call::Stop),
            ]
        );

        let state = fx.scheduler.voice_state(0).unwrap();
        assert_eq!(state.phase, VoicePhase::Idle);
        assert_eq!(state.window, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trigger_does_not_wait_for_grain() {
        let mut fx = fixture(2);
        let before = Instant::now();
        fx.scheduler.trigger(0, 0, spec()).unwrap();
        fx.scheduler.trigger(1, 2, spec()).unwrap();
        assert_eq!(Instant::now(), before);
        fx.scheduler.drain().await;
        assert_eq!(ms(before.elapsed()), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stealing_cuts_release_short() {
        let mut fx = fixture(1);
        fx.scheduler.trigger(0, 0, spec()).unwrap();

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(fx.scheduler.voice_state(0).unwrap().phase, VoicePhase::Release);

        let second = fx.scheduler.trigger(2, 2, spec()).unwrap();
        assert!(second.stolen);
        assert_eq!(second.slot, 0);
        fx.scheduler.drain().await;

        let stops: Vec<u128> = fx
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (_, call))| *call == Call::Stop)
            .map(|(at, _)| ms(*at))
            .collect();
        // The first grain's own stop at 600ms never happens.
        assert_eq!(stops, vec![450, 1050]);

        let last = *fx.messages.lock().unwrap().last().unwrap();
        assert_eq!((ms(last.0), last.1), (850, (2, 1.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stolen_grain_stops_syncing() {
        let mut fx = fixture(1);
        fx.scheduler.trigger(0, 0, spec()).unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        fx.scheduler.trigger(1, 1, spec()).unwrap();
        fx.scheduler.drain().await;

        let from_first: Vec<u128> = fx
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, (w, _))| *w == 0)
            .map(|(at, _)| ms(*at))
            .collect();
        assert_eq!(from_first, vec![0, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_window_is_rejected() {
        let mut fx = fixture(2);
        assert!(matches!(
            fx.scheduler.trigger(0, 99, spec()),
            Err(TriggerError::UnknownWindow(99))
        ));
        // Rejected triggers do not advance the rotation.
        assert_eq!(fx.scheduler.trigger(0, 0, spec()).unwrap().slot, 0);
        fx.scheduler.drain().await;
    }
}
