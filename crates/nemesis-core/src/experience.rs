//! Experience records and prediction correlation tokens

use serde::{Deserialize, Serialize};

/// Token returned from every prediction.
///
/// The simulator passes it back when storing the experience that the
/// prediction produced, making the state/action pairing an explicit
/// data dependency instead of an implicit "last stack" slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PredictionToken(pub u64);

/// One (state, action, reward, done) tuple held by the replay memory.
///
/// `stack` is the raw (unnormalized) frame stack cached at prediction
/// time; normalization is re-applied when the record is replayed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experience {
    /// Stacked observation at the time the action was chosen.
    pub stack: Vec<f32>,

    /// Index of the action taken.
    pub action: usize,

    /// Scalar reward the simulator attributed to the action.
    pub reward: f32,

    /// Whether the round ended on this transition.
    pub done: bool,
}

impl PredictionToken {
    /// Successor token; the engine hands these out sequentially.
    pub fn next(self) -> Self {
        PredictionToken(self.0.wrapping_add(1))
    }
}
