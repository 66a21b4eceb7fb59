//! Feature aggregation: successive analysis frames averaged into one query
//!
//! One cycle runs `AwaitFrames -> Averaging -> EmitQuery`. The frame count
//! can be requested at any time but is only latched when a new cycle starts.

/// Position of the aggregator within its current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregatorState {
    /// No frame of the next cycle captured yet.
    AwaitFrames,
    /// Some, but not all, frames captured.
    Averaging,
    /// The mean is ready to be taken.
    EmitQuery,
}

#[derive(Debug, Clone)]
pub struct FeatureAggregator {
    sums: Vec<f64>,
    captured: usize,
    cycle_frames: usize,
    requested_frames: usize,
    state: AggregatorState,
    query: Option<Vec<f32>>,
}

impl FeatureAggregator {
    pub fn new(num_coeffs: usize, num_frames: usize) -> Self {
        let num_frames = num_frames.max(1);
        Self {
            sums: vec![0.0; num_coeffs],
            captured: 0,
            cycle_frames: num_frames,
            requested_frames: num_frames,
            state: AggregatorState::AwaitFrames,
            query: None,
        }
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn num_coeffs(&self) -> usize {
        self.sums.len()
    }

    /// Frame count of the cycle in progress (or of the last one emitted).
    pub fn cycle_frames(&self) -> usize {
        self.cycle_frames
    }

    /// Ask for a new frame count; applied when the next cycle begins.
    pub fn request_frames(&mut self, num_frames: usize) {
        self.requested_frames = num_frames.max(1);
    }

    /// Capture one frame. Returns the new state; on [`AggregatorState::EmitQuery`]
    /// the mean is available from [`FeatureAggregator::take_query`].
    ///
    /// Pushing while a query is still pending discards it and starts the
    /// next cycle.
    pub fn push(&mut self, frame: &[f32]) -> AggregatorState {
        debug_assert_eq!(frame.len(), self.sums.len(), "frame width mismatch");

        if self.state != AggregatorState::Averaging {
            if self.query.take().is_some() {
                log::debug!("Discarding untaken query");
            }
            self.cycle_frames = self.requested_frames;
            self.captured = 0;
            self.sums.iter_mut().for_each(|s| *s = 0.0);
        }

        for (sum, &value) in self.sums.iter_mut().zip(frame) {
            *sum += value as f64;
        }
        self.captured += 1;

        if self.captured < self.cycle_frames {
            self.state = AggregatorState::Averaging;
        } else {
            let n = self.captured as f64;
            self.query = Some(self.sums.iter().map(|s| (s / n) as f32).collect());
            self.state = AggregatorState::EmitQuery;
        }

        self.state
    }

    /// Hand out the finished mean vector and return to `AwaitFrames`.
    pub fn take_query(&mut self) -> Option<Vec<f32>> {
        let query = self.query.take()?;
        self.state = AggregatorState::AwaitFrames;
        Some(query)
    }
}
