//! Grain gain envelope

use crate::config::VoiceConfig;
use std::time::Duration;

/// Gain shape of one grain. The envelope is open (attack then hold) for the
/// aggregation window the grain was chosen in, then releases for a fixed
/// proportion of that window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrainEnvelope {
    pub attack: Duration,
    /// Attack plus hold.
    pub open: Duration,
    pub release: Duration,
    pub gain: f32,
}

impl GrainEnvelope {
    pub fn new(hop: Duration, frames: usize, config: &VoiceConfig) -> Self {
        let open = hop * frames.max(1) as u32;
        Self {
            attack: open.mul_f64(config.attack_fraction),
            open,
            release: open.mul_f64(config.release_fraction),
            gain: config.gain,
        }
    }

    pub fn hold(&self) -> Duration {
        self.open.saturating_sub(self.attack)
    }

    /// Time from trigger until the voice falls silent.
    pub fn total(&self) -> Duration {
        self.open + self.release
    }
}
