//! Durable head-weight persistence
//!
//! A single record under a fixed `latest` key in the engine's data
//! directory. Absence is a normal first-run state, never an error.

use crate::heads::PolicyHeads;
use nemesis_core::{PolicyError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Key (file stem) of the persisted record.
pub const WEIGHTS_KEY: &str = "latest";

/// Persisted head-weight record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SavedWeights {
    pub actor_weights: Vec<Vec<f32>>,
    pub actor_bias: Vec<f32>,
    pub critic_weights: Vec<Vec<f32>>,
    pub critic_bias: Vec<f32>,
    /// Unix milliseconds at save time.
    pub timestamp: u64,
}

impl SavedWeights {
    pub fn from_heads(heads: &PolicyHeads) -> Self {
        Self {
            actor_weights: heads.actor_weights.clone(),
            actor_bias: heads.actor_bias.clone(),
            critic_weights: heads.critic_weights.clone(),
            critic_bias: heads.critic_bias.clone(),
            timestamp: unix_millis(),
        }
    }

    pub fn into_heads(self) -> PolicyHeads {
        PolicyHeads {
            actor_weights: self.actor_weights,
            actor_bias: self.actor_bias,
            critic_weights: self.critic_weights,
            critic_bias: self.critic_bias,
        }
    }
}

/// File-backed key-value store for the head weights.
#[derive(Debug, Clone)]
pub struct WeightStore {
    dir: PathBuf,
}

impl WeightStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self) -> PathBuf {
        self.dir.join(format!("{WEIGHTS_KEY}.json"))
    }

    /// Serialize the heads under the fixed key, overwriting any prior
    /// record. Creates the store directory on first use.
    pub fn save(&self, heads: &PolicyHeads) -> Result<()> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            PolicyError::StorageError(format!(
                "failed to create weight store {}: {e}",
                self.dir.display()
            ))
        })?;
        let record = SavedWeights::from_heads(heads);
        let json = serde_json::to_string(&record)?;
        let path = self.record_path();
        std::fs::write(&path, json).map_err(|e| {
            PolicyError::StorageError(format!("failed to write {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "head weights persisted");
        Ok(())
    }

    /// Load the persisted record. `Ok(None)` when nothing was saved.
    pub fn load(&self) -> Result<Option<SavedWeights>> {
        let path = self.record_path();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no persisted weights");
                return Ok(None);
            }
            Err(e) => {
                return Err(PolicyError::StorageError(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };
        let record = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    /// Delete the persisted record; absence is fine.
    pub fn delete(&self) -> Result<()> {
        let path = self.record_path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "persisted weights deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PolicyError::StorageError(format!(
                "failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store(tag: &str) -> WeightStore {
        let dir = std::env::temp_dir().join(format!(
            "nemesis-store-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        WeightStore::new(dir)
    }

    fn sample_heads() -> PolicyHeads {
        PolicyHeads {
            actor_weights: vec![vec![0.1, -0.2], vec![0.3, 0.4]],
            actor_bias: vec![0.0, 0.5],
            critic_weights: vec![vec![1.0], vec![-1.0]],
            critic_bias: vec![0.25],
        }
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = temp_store("roundtrip");
        let heads = sample_heads();
        store.save(&heads).unwrap();

        // A fresh store over the same directory stands in for a fresh
        // process.
        let reopened = WeightStore::new(store.dir().to_path_buf());
        let loaded = reopened.load().unwrap().unwrap();
        assert!(loaded.timestamp > 0);
        assert_eq!(loaded.into_heads(), heads);
    }

    #[test]
    fn load_absent_is_none() {
        let store = temp_store("absent");
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let store = temp_store("delete");
        store.delete().unwrap();
        store.save(&sample_heads()).unwrap();
        store.delete().unwrap();
        assert!(store.load().unwrap().is_none());
        store.delete().unwrap();
    }

    #[test]
    fn wire_field_names_are_camel_case() {
        let record = SavedWeights::from_heads(&sample_heads());
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"actorWeights\""));
        assert!(json.contains("\"criticBias\""));
        assert!(json.contains("\"timestamp\""));
    }
}
