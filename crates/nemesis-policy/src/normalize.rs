//! Feature normalization
//!
//! Per-feature mean/variance statistics exported alongside the
//! backbone (the training environment's running VecNormalize state).
//! Statistics cover one observation; when normalizing a full frame
//! stack the index wraps modulo the statistics length.

use nemesis_core::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

fn default_epsilon() -> f32 {
    1e-8
}

/// Persisted normalization statistics document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormStats {
    pub mean: Vec<f32>,
    pub variance: Vec<f32>,
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

/// Feature-wise z-scoring with an identity fallback.
///
/// Immutable after construction; applied to both live inference inputs
/// and historical stacks replayed during training.
#[derive(Debug, Clone)]
pub struct Normalizer {
    stats: Option<NormStats>,
}

impl Normalizer {
    /// A normalizer that passes inputs through unchanged.
    pub fn identity() -> Self {
        Self { stats: None }
    }

    pub fn new(stats: NormStats) -> Result<Self> {
        if stats.mean.is_empty() || stats.mean.len() != stats.variance.len() {
            return Err(PolicyError::InitializationFailure(format!(
                "normalization stats shape mismatch: {} means, {} variances",
                stats.mean.len(),
                stats.variance.len()
            )));
        }
        Ok(Self { stats: Some(stats) })
    }

    /// Load statistics from a JSON document on disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PolicyError::InitializationFailure(format!(
                "failed to read norm stats {}: {e}",
                path.display()
            ))
        })?;
        let stats: NormStats = serde_json::from_str(&raw).map_err(|e| {
            PolicyError::InitializationFailure(format!("failed to parse norm stats: {e}"))
        })?;
        debug!(features = stats.mean.len(), "normalization stats loaded");
        Self::new(stats)
    }

    /// Normalize a vector feature-wise, wrapping the statistics modulo
    /// their length. Never fails; without stats this is the identity.
    pub fn normalize(&self, x: &[f32]) -> Vec<f32> {
        let Some(stats) = &self.stats else {
            return x.to_vec();
        };
        let n = stats.mean.len();
        x.iter()
            .enumerate()
            .map(|(i, &v)| (v - stats.mean[i % n]) / (stats.variance[i % n] + stats.epsilon).sqrt())
            .collect()
    }
}
