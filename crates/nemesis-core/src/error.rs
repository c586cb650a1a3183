//! Error types for the policy engine and worker service

use thiserror::Error;

/// Result type for policy-engine operations
pub type Result<T> = std::result::Result<T, PolicyError>;

/// Policy-engine error taxonomy
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Asset loading failed; the engine stays unusable until a fresh
    /// init succeeds.
    #[error("Initialization failed: {0}")]
    InitializationFailure(String),

    /// Prediction or storage requested before init completed.
    #[error("Engine not ready, call init first")]
    NotReady,

    /// Training requested with too few experience records; the pass is
    /// skipped, nothing is mutated.
    #[error("Insufficient data: {have} records, need {need}")]
    InsufficientData { have: usize, need: usize },

    /// A single inference or training pass failed mid-computation; the
    /// request is dropped, engine state stays intact.
    #[error("Compute error: {0}")]
    ComputeFailure(String),

    /// Weight persistence I/O failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// JSON encoding/decoding failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Malformed request payload (wrong observation length, unknown
    /// action index, unknown profile name).
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The worker task is gone.
    #[error("Engine channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for PolicyError {
    fn from(err: serde_json::Error) -> Self {
        PolicyError::SerializationError(err.to_string())
    }
}
