//! Frame stacking
//!
//! The backbone was trained on the last `STACK` observations
//! concatenated into one flat vector; a single frame carries no
//! velocity-derivative or attack-phase-trend information.

/// Sliding window of the last N observations, flattened.
#[derive(Debug, Clone)]
pub struct FrameStack {
    buf: Vec<f32>,
    features: usize,
    depth: usize,
}

impl FrameStack {
    pub fn new(features: usize, depth: usize) -> Self {
        Self {
            buf: Vec::with_capacity(features * depth),
            features,
            depth,
        }
    }

    /// Slide the window and return the current stacked view.
    ///
    /// The first push after (re)initialization primes the window by
    /// replicating the observation `depth` times; afterwards the oldest
    /// frame is dropped and the new one appended, oldest first.
    pub fn push(&mut self, obs: &[f32]) -> &[f32] {
        debug_assert_eq!(obs.len(), self.features);
        if self.buf.is_empty() {
            for _ in 0..self.depth {
                self.buf.extend_from_slice(obs);
            }
        } else {
            self.buf.drain(..self.features);
            self.buf.extend_from_slice(obs);
        }
        &self.buf
    }

    /// Whether at least one observation has been pushed.
    pub fn is_primed(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Current stacked view; empty before priming.
    pub fn as_slice(&self) -> &[f32] {
        &self.buf
    }

    /// Drop all history. The next push primes from scratch.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
