//! Live parameter changes
//!
//! Control events arrive on a channel from an independent task and are
//! applied only when the engine drains them at a cycle boundary.

use crate::config::{is_valid_tempo, MAX_FRAMES};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlEvent {
    SetFrames(usize),
    SetTempo(f64),
    Quit,
}

pub type ControlSender = mpsc::UnboundedSender<ControlEvent>;
pub type ControlReceiver = mpsc::UnboundedReceiver<ControlEvent>;

pub fn control_channel() -> (ControlSender, ControlReceiver) {
    mpsc::unbounded_channel()
}

/// Parameters latched by the engine at the start of each cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlState {
    pub num_frames: usize,
    pub tempo_bpm: f64,
    pub quit: bool,
}

impl ControlState {
    pub fn new(num_frames: usize, tempo_bpm: f64) -> Self {
        Self {
            num_frames,
            tempo_bpm,
            quit: false,
        }
    }

    pub fn apply(&mut self, event: ControlEvent) {
        match event {
            ControlEvent::SetFrames(n) => {
                self.num_frames = n.clamp(1, MAX_FRAMES);
                log::info!("Frames per query -> {}", self.num_frames);
            }
            ControlEvent::SetTempo(bpm) if is_valid_tempo(bpm) => {
                self.tempo_bpm = bpm;
                log::info!("Tempo -> {} bpm", bpm);
            }
            ControlEvent::SetTempo(bpm) => log::warn!("Ignoring tempo {}", bpm),
            ControlEvent::Quit => self.quit = true,
        }
    }

    /// Apply everything queued so far without waiting. Returns the number of
    /// events applied.
    pub fn drain(&mut self, rx: &mut ControlReceiver) -> usize {
        let mut applied = 0;
        while let Ok(event) = rx.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_applies_in_order() {
        let (tx, mut rx) = control_channel();
        let mut state = ControlState::new(4, 120.0);

        tx.send(ControlEvent::SetFrames(2)).unwrap();
        tx.send(ControlEvent::SetFrames(7)).unwrap();
        tx.send(ControlEvent::SetTempo(90.0)).unwrap();

        assert_eq!(state.drain(&mut rx), 3);
        assert_eq!(state, ControlState::new(7, 90.0));
        assert_eq!(state.drain(&mut rx), 0);
    }

    #[test]
    fn test_values_are_bounded() {
        let mut state = ControlState::new(4, 120.0);
        state.apply(ControlEvent::SetFrames(0));
        assert_eq!(state.num_frames, 1);
        state.apply(ControlEvent::SetFrames(50));
        assert_eq!(state.num_frames, MAX_FRAMES);
        state.apply(ControlEvent::SetTempo(-5.0));
        state.apply(ControlEvent::SetTempo(f64::NAN));
        assert_eq!(state.tempo_bpm, 120.0);
    }

    #[test]
    fn test_tempo_outside_range_is_ignored() {
        let mut state = ControlState::new(4, 120.0);
        for bpm in [1e-20, 0.25, 5000.0, f64::INFINITY] {
            state.apply(ControlEvent::SetTempo(bpm));
            assert_eq!(state.tempo_bpm, 120.0, "tempo {} accepted", bpm);
        }
        state.apply(ControlEvent::SetTempo(1000.0));
        assert_eq!(state.tempo_bpm, 1000.0);
    }

    #[test]
    fn test_quit() {
        let mut state = ControlState::new(4, 120.0);
        state.apply(ControlEvent::Quit);
        assert!(state.quit);
    }
}
