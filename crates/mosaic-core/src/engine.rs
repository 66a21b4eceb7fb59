//! The aggregation / search / trigger loop
//!
//! One long-running task walks the driver one hop at a time on an anchored
//! tick grid. At every cycle boundary it latches the control state; after
//! the cycle's last frame it forms the query, searches, and hands the grain
//! to the scheduler without waiting for it.

use crate::aggregator::{AggregatorState, FeatureAggregator};
use crate::config::{hop_for_tempo, MosaicConfig};
use crate::control::{ControlReceiver, ControlState};
use crate::driver::DriverInput;
use crate::index::NearestNeighborIndex;
use crate::normalizer::RangeNormalizer;
use crate::scheduler::{GrainScheduler, GrainSpec};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::Duration;
use tokio::time::{sleep_until, Instant};

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub frames: u64,
    pub cycles: u64,
    pub triggers: u64,
    pub skipped_cycles: u64,
    pub stolen_voices: u64,
    pub final_tempo_bpm: f64,
    pub final_num_frames: usize,
    pub quit_requested: bool,
    pub elapsed_secs: f64,
}

pub struct Engine {
    config: MosaicConfig,
    index: NearestNeighborIndex,
    normalizer: RangeNormalizer,
    scheduler: GrainScheduler,
    driver: Box<dyn DriverInput>,
    controls: ControlReceiver,
    aggregator: FeatureAggregator,
    rng: StdRng,
}

impl Engine {
    pub fn new(
        config: MosaicConfig,
        index: NearestNeighborIndex,
        normalizer: RangeNormalizer,
        scheduler: GrainScheduler,
        driver: Box<dyn DriverInput>,
        controls: ControlReceiver,
    ) -> Self {
        let rng = match config.search.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let aggregator = FeatureAggregator::new(index.num_coeffs(), config.timing.num_frames);

        Self {
            config,
            index,
            normalizer,
            scheduler,
            driver,
            controls,
            aggregator,
            rng,
        }
    }

    /// Run until the driver is exhausted or a quit event arrives, then wait
    /// for the grains still sounding.
    pub async fn run(mut self) -> RunStats {
        let started = Instant::now();
        let timing = self.config.timing.clone();
        let mut control = ControlState::new(timing.num_frames, timing.tempo_bpm);
        let mut hop = timing.hop();
        let mut tempo = timing.tempo_bpm;
        let mut next_tick = started;
        let mut stats = RunStats::default();

        log::info!(
            "Engine running: {} bpm, {} frames per query, pool of {}",
            tempo,
            control.num_frames,
            self.scheduler.pool_size()
        );

        loop {
            if self.aggregator.state() == AggregatorState::AwaitFrames {
                control.drain(&mut self.controls);
                if control.quit {
                    log::info!("Quit requested");
                    stats.quit_requested = true;
                    break;
                }
                tempo = control.tempo_bpm;
                hop = hop_for_tempo(tempo, timing.ticks_per_beat);
                self.aggregator.request_frames(control.num_frames);
            }

            let Some(frame) = self.driver.next_frame(hop) else {
                log::info!("Driver exhausted after {} frames", stats.frames);
                break;
            };
            stats.frames += 1;

            if frame.len() != self.aggregator.num_coeffs() {
                log::warn!(
                    "Dropping frame of {} values (expected {})",
                    frame.len(),
                    self.aggregator.num_coeffs()
                );
            } else if self.aggregator.push(&frame) == AggregatorState::EmitQuery {
                if let Some(query) = self.aggregator.take_query() {
                    self.handle_query(query, hop, tempo, &mut stats);
                }
            }

            next_tick += hop;
            sleep_until(next_tick).await;
        }

        self.scheduler.drain().await;

        stats.final_tempo_bpm = control.tempo_bpm;
        stats.final_num_frames = control.num_frames;
        stats.elapsed_secs = started.elapsed().as_secs_f64();
        stats
    }

    fn handle_query(&mut self, query: Vec<f32>, hop: Duration, tempo: f64, stats: &mut RunStats) {
        stats.cycles += 1;

        let query = match self.normalizer.apply(query) {
            Ok(query) => query,
            Err(e) => {
                log::warn!("Cycle {} skipped: {}", stats.cycles, e);
                stats.skipped_cycles += 1;
                return;
            }
        };

        let hits = match self.index.search(&query, self.config.search.k) {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!("Cycle {} skipped: {}", stats.cycles, e);
                stats.skipped_cycles += 1;
                return;
            }
        };
        let Some(&nearest) = hits.first() else {
            return;
        };
        let alternate = hits[self.rng.gen_range(0..hits.len())];

        log::debug!(
            "Cycle {}: nearest {} ({:.3}), playing {} ({:.3})",
            stats.cycles,
            nearest.id,
            nearest.distance,
            alternate.id,
            alternate.distance
        );

        let timing = &self.config.timing;
        let rate = if timing.tempo_sync {
            tempo / timing.reference_tempo_bpm
        } else {
            1.0
        };
        let spec = GrainSpec {
            frames: self.aggregator.cycle_frames(),
            hop,
            rate,
        };

        match self.scheduler.trigger(nearest.id, alternate.id, spec) {
            Ok(trigger) => {
                stats.triggers += 1;
                if trigger.stolen {
                    stats.stolen_voices += 1;
                }
            }
            Err(e) => log::warn!("Cycle {}: {}", stats.cycles, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{control_channel, ControlEvent};
    use crate::sync::SyncEmitter;
    use crate::voice::{SourceBank, SourceBuffer, VoiceOutput};
    use approx::assert_relative_eq;
    use mosaic_corpus::{Corpus, MinMax, Range};
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    struct ScriptedDriver {
        frames: VecDeque<Vec<f32>>,
        hops: Arc<Mutex<Vec<Duration>>>,
    }

    impl DriverInput for ScriptedDriver {
        fn next_frame(&mut self, hop: Duration) -> Option<Vec<f32>> {
            self.hops.lock().unwrap().push(hop);
            self.frames.pop_front()
        }
    }

    #[derive(Default)]
    struct StartedGrains(Mutex<Vec<usize>>);

    impl SyncEmitter for StartedGrains {
        fn emit(&self, window: usize, progress: f32) {
            if progress == 0.0 {
                self.0.lock().unwrap().push(window);
            }
        }
    }

    struct SilentVoice;

    impl VoiceOutput for SilentVoice {
        fn bind(&mut self, _source: Arc<SourceBuffer>) {}
        fn seek(&mut self, _frame: u64) {}
        fn set_rate(&mut self, _rate: f64) {}
        fn ramp_gain(&mut self, _target: f32, _duration: Duration) {}
        fn start(&mut self) {}
        fn stop(&mut self) {}
    }

    struct Harness {
        engine: Engine,
        grains: Arc<StartedGrains>,
        hops: Arc<Mutex<Vec<Duration>>>,
        controls: crate::control::ControlSender,
    }

    fn harness(frames: Vec<Vec<f32>>, config: MosaicConfig, normalizer: RangeNormalizer) -> Harness {
        let mut corpus = Corpus::new(2);
        corpus.push("a.wav", 0.0, &[0.0, 0.0]);
        corpus.push("a.wav", 1.0, &[1.0, 1.0]);
        corpus.push("b.wav", 0.0, &[10.0, 10.0]);
        let index = NearestNeighborIndex::train(&corpus.table);

        let bank = SourceBank::from_buffers(
            corpus
                .files
                .iter()
                .map(|path| {
                    Arc::new(SourceBuffer {
                        path: path.clone(),
                        samples: vec![0.0; 100],
                        sample_rate: 100,
                    })
                })
                .collect(),
        );

        let grains = Arc::new(StartedGrains::default());
        let outputs = (0..config.voices.pool_size)
            .map(|_| Box::new(SilentVoice) as Box<dyn VoiceOutput>)
            .collect();
        let scheduler = GrainScheduler::new(
            outputs,
            Arc::new(corpus),
            Arc::new(bank),
            grains.clone(),
            config.voices.clone(),
        );

        let hops = Arc::new(Mutex::new(Vec::new()));
        let driver = ScriptedDriver {
            frames: frames.into(),
            hops: hops.clone(),
        };
        let (tx, rx) = control_channel();

        Harness {
            engine: Engine::new(config, index, normalizer, scheduler, Box::new(driver), rx),
            grains,
            hops,
            controls: tx,
        }
    }

    fn config(k: usize) -> MosaicConfig {
        let mut config = MosaicConfig::default();
        config.search.k = k;
        config.search.seed = Some(7);
        config
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_trigger_nearest_window() {
        let frames = vec![vec![0.9, 0.9]; 8];
        let h = harness(frames, config(1), RangeNormalizer::disabled());

        let stats = h.engine.run().await;

        assert_eq!(stats.frames, 8);
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.triggers, 2);
        assert_eq!(stats.skipped_cycles, 0);
        assert_eq!(*h.grains.0.lock().unwrap(), vec![1, 1]);

        // Last trigger at tick 7 (875ms) plus a 750ms envelope.
        assert_relative_eq!(stats.elapsed_secs, 1.625, epsilon = 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mean_of_cycle_drives_search() {
        // Mean of the cycle is (5.5, 5.5): closer to window 2 than window 1.
        let mut frames = vec![vec![1.0, 1.0]; 3];
        frames.push(vec![19.0, 19.0]);
        let h = harness(frames, config(1), RangeNormalizer::disabled());

        h.engine.run().await;
        assert_eq!(*h.grains.0.lock().unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternate_is_one_of_k_hits() {
        let frames = vec![vec![0.4, 0.4]; 40];
        let h = harness(frames, config(2), RangeNormalizer::disabled());

        let stats = h.engine.run().await;
        assert_eq!(stats.triggers, 10);
        let grains = h.grains.0.lock().unwrap();
        assert!(grains.iter().all(|&id| id == 0 || id == 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_frame_change_applies_at_cycle_boundary() {
        let frames = vec![vec![0.0, 0.0]; 8];
        let h = harness(frames, config(1), RangeNormalizer::disabled());
        h.controls.send(ControlEvent::SetFrames(2)).unwrap();

        let stats = h.engine.run().await;
        assert_eq!(stats.cycles, 4);
        assert_eq!(stats.final_num_frames, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tempo_change_sets_hop() {
        let frames = vec![vec![0.0, 0.0]; 4];
        let h = harness(frames, config(1), RangeNormalizer::disabled());
        h.controls.send(ControlEvent::SetTempo(60.0)).unwrap();

        let stats = h.engine.run().await;
        assert_eq!(stats.final_tempo_bpm, 60.0);
        assert!(h
            .hops
            .lock()
            .unwrap()
            .iter()
            .all(|&hop| hop == Duration::from_millis(250)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unusable_tempo_keeps_previous_hop() {
        let frames = vec![vec![0.0, 0.0]; 4];
        let h = harness(frames, config(1), RangeNormalizer::disabled());
        h.controls.send(ControlEvent::SetTempo(1e-20)).unwrap();
        h.controls.send(ControlEvent::SetTempo(f64::INFINITY)).unwrap();

        let stats = h.engine.run().await;
        assert_eq!(stats.frames, 4);
        assert_eq!(stats.final_tempo_bpm, 120.0);
        assert!(h
            .hops
            .lock()
            .unwrap()
            .iter()
            .all(|&hop| hop == Duration::from_millis(125)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_stops_before_capture() {
        let frames = vec![vec![0.0, 0.0]; 8];
        let h = harness(frames, config(1), RangeNormalizer::disabled());
        h.controls.send(ControlEvent::Quit).unwrap();

        let stats = h.engine.run().await;
        assert!(stats.quit_requested);
        assert_eq!(stats.frames, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normalizer_mismatch_skips_cycles() {
        let normalizer = RangeNormalizer::new(
            MinMax::new(vec![Range::new(0.0, 1.0)]),
            MinMax::new(vec![Range::new(0.0, 1.0)]),
        );
        let frames = vec![vec![0.0, 0.0]; 8];
        let h = harness(frames, config(1), normalizer);

        let stats = h.engine.run().await;
        assert_eq!(stats.cycles, 2);
        assert_eq!(stats.skipped_cycles, 2);
        assert_eq!(stats.triggers, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_normalized_query_is_searched() {
        // Driver range 0..100 mapped onto corpus range 0..10.
        let normalizer = RangeNormalizer::new(
            MinMax::new(vec![Range::new(0.0, 10.0); 2]),
            MinMax::new(vec![Range::new(0.0, 100.0); 2]),
        );
        let frames = vec![vec![100.0, 100.0]; 4];
        let h = harness(frames, config(1), normalizer);

        h.engine.run().await;
        assert_eq!(*h.grains.0.lock().unwrap(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_small_pool_steals() {
        let mut cfg = config(1);
        cfg.voices.pool_size = 1;
        let frames = vec![vec![0.0, 0.0]; 8];
        let h = harness(frames, cfg, RangeNormalizer::disabled());

        let stats = h.engine.run().await;
        // Second grain starts while the first is still releasing.
        assert_eq!(stats.stolen_voices, 1);
    }
}
