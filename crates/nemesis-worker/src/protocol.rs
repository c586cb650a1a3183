//! Wire protocol between the simulator and the policy worker
//!
//! Messages are serialized as JSON with internally-tagged enums.
//! Format: {"Type": "MessageType", ...fields}
//!
//! Note: `rename_all` on enums only affects variant names, not field
//! names inside variants. Each field is explicitly renamed for
//! PascalCase.

use serde::{Deserialize, Serialize};

/// Requests the simulator sends to the worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "PascalCase")]
pub enum WorkerRequest {
    /// Load assets and persisted weights; must succeed before anything
    /// else is serviced.
    Init,

    /// Switch the exploration profile; applied immediately.
    SetDifficulty {
        #[serde(rename = "Profile")]
        profile: String,
    },

    /// Return the heads to the pre-trained baseline.
    ResetWeights,

    /// Run one inference pass over a single-frame observation.
    Predict {
        #[serde(rename = "Observation")]
        observation: Vec<f32>,
    },

    /// Pair an action/reward with the prediction identified by `token`.
    StoreExperience {
        #[serde(rename = "Token")]
        token: u64,
        #[serde(rename = "Action")]
        action: usize,
        #[serde(rename = "Reward")]
        reward: f32,
        #[serde(rename = "Done")]
        done: bool,
    },

    /// Run a training pass (typically fired at round end).
    Train,

    /// Round reset: drop frame-stack history and the cached prediction.
    ResetEpisode,

    /// Stop the worker.
    Shutdown,
}

/// Responses and push events the worker sends back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "Type", rename_all = "PascalCase")]
pub enum WorkerResponse {
    /// Init succeeded.
    Ready,

    /// Init (or a later request) failed.
    Error {
        #[serde(rename = "Message")]
        message: String,
    },

    /// Request arrived before a successful init.
    NotReady,

    /// Difficulty profile applied.
    DifficultySet {
        #[serde(rename = "Profile")]
        profile: String,
    },

    /// Heads returned to baseline, persisted record deleted.
    WeightsReset,

    /// Prediction result.
    Action {
        #[serde(rename = "Action")]
        action: usize,
        #[serde(rename = "Confidence")]
        confidence: f32,
        #[serde(rename = "Probabilities")]
        probabilities: Vec<f32>,
        #[serde(rename = "Token")]
        token: u64,
    },

    /// Experience appended to replay memory, no stats report due.
    ExperienceStored,

    /// No cached prediction matched the token; nothing was stored.
    ExperienceIgnored,

    /// Periodic replay-buffer report (every Nth stored experience).
    Stats {
        #[serde(rename = "BufferSize")]
        buffer_size: usize,
    },

    /// Training pass started.
    TrainingStart {
        #[serde(rename = "TotalIterations")]
        total_iterations: usize,
    },

    /// One training iteration finished.
    TrainingProgress {
        #[serde(rename = "Current")]
        current: usize,
        #[serde(rename = "Total")]
        total: usize,
    },

    /// Training pass finished; zero iterations means it was skipped
    /// for lack of data.
    TrainingComplete {
        #[serde(rename = "Iterations")]
        iterations: usize,
    },

    /// Frame-stack history cleared.
    EpisodeReset,

    /// Worker is exiting.
    ShutdownComplete,
}

/// Serialize a message to JSON bytes
pub fn serialize<T: Serialize>(msg: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(msg)
}

/// Deserialize a message from JSON bytes
pub fn deserialize<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}
