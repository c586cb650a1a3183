//! The policy engine
//!
//! One engine instance per game session owns every piece of mutable
//! policy state: the frame stack, replay memory, trainable heads,
//! optimizer, difficulty profile, and the weight store. Construction
//! happens through an explicit [`PolicyEngine::init`]; there are no
//! process-global singletons. The engine is synchronous; the worker
//! crate serializes access to it through a message queue.

use crate::adam::Adam;
use crate::backbone::Backbone;
use crate::heads::PolicyHeads;
use crate::math;
use crate::normalize::Normalizer;
use crate::replay::ReplayMemory;
use crate::stack::FrameStack;
use crate::store::WeightStore;
use crate::trainer::{self, TrainConfig, TrainReport};
use nemesis_core::{
    DifficultyProfile, Experience, FEATURES, FightAction, PolicyError, PredictionToken, Result,
    STACK, STACKED_LEN,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use tracing::{info, warn};

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Serialized frozen-backbone graph.
    pub backbone_path: PathBuf,
    /// Normalization-statistics document.
    pub stats_path: PathBuf,
    /// Directory for the persisted head weights.
    pub data_dir: PathBuf,
    /// Replay memory capacity.
    pub replay_capacity: usize,
    /// Emit a buffer-size stats event every Nth stored experience.
    pub stats_interval: usize,
    /// Training hyperparameters.
    pub train: TrainConfig,
}

impl EngineConfig {
    /// Conventional layout: `<assets>/backbone.json`,
    /// `<assets>/norm_stats.json`, weights under `<data>/weights`.
    pub fn new(assets_dir: impl Into<PathBuf>, data_dir: impl Into<PathBuf>) -> Self {
        let assets = assets_dir.into();
        Self {
            backbone_path: assets.join("backbone.json"),
            stats_path: assets.join("norm_stats.json"),
            data_dir: data_dir.into().join("weights"),
            replay_capacity: 2000,
            stats_interval: 100,
            train: TrainConfig::default(),
        }
    }
}

/// Result of one inference call.
#[derive(Debug, Clone)]
pub struct Prediction {
    /// Chosen action.
    pub action: FightAction,
    /// Critic value estimate, surfaced as "confidence".
    pub confidence: f32,
    /// Full temperature-scaled action distribution, for observability.
    pub probabilities: Vec<f32>,
    /// Correlation token to pass back with `store_experience`.
    pub token: PredictionToken,
}

/// Outcome of storing one experience record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Record stored; buffer now holds this many records.
    Stored { len: usize },
    /// Record stored and a periodic stats report is due.
    StatsDue { len: usize },
    /// No cached prediction matched the token; nothing stored.
    Ignored,
}

/// The stateful inference/training service core.
pub struct PolicyEngine {
    backbone: Backbone,
    normalizer: Normalizer,
    heads: PolicyHeads,
    adam: Adam,
    stack: FrameStack,
    replay: ReplayMemory,
    store: WeightStore,
    profile: DifficultyProfile,
    config: EngineConfig,
    rng: StdRng,
    next_token: PredictionToken,
    /// Raw stack cached at prediction time, keyed by its token.
    cached: Option<(PredictionToken, Vec<f32>)>,
    inserts: u64,
}

impl PolicyEngine {
    /// Load assets and persisted weights and build a ready engine.
    pub fn init(config: EngineConfig) -> Result<Self> {
        Self::init_with_rng(config, StdRng::from_os_rng())
    }

    /// Like [`init`](Self::init) with a caller-supplied RNG; used by
    /// tests that need reproducible sampling.
    pub fn init_with_rng(config: EngineConfig, rng: StdRng) -> Result<Self> {
        let backbone = Backbone::load(&config.backbone_path)?;
        if backbone.input_dim() != STACKED_LEN {
            return Err(PolicyError::InitializationFailure(format!(
                "backbone expects {} inputs, engine stacks {}x{}",
                backbone.input_dim(),
                FEATURES,
                STACK
            )));
        }
        let normalizer = Normalizer::load(&config.stats_path)?;
        let store = WeightStore::new(&config.data_dir);

        let heads = match store.load()? {
            Some(record) => {
                let heads = record.into_heads();
                if heads.compatible_with(&backbone) {
                    info!("resuming from persisted head weights");
                    heads
                } else {
                    warn!("persisted weights do not match backbone, starting from baseline");
                    PolicyHeads::from_backbone(&backbone)
                }
            }
            None => {
                info!("no persisted weights, starting from baseline");
                PolicyHeads::from_backbone(&backbone)
            }
        };

        let adam = Adam::new(config.train.learning_rate, &heads);
        Ok(Self {
            stack: FrameStack::new(FEATURES, STACK),
            replay: ReplayMemory::new(config.replay_capacity),
            store,
            profile: DifficultyProfile::default(),
            rng,
            next_token: PredictionToken(0),
            cached: None,
            inserts: 0,
            backbone,
            normalizer,
            heads,
            adam,
            config,
        })
    }

    /// Swap the active difficulty profile; read on the next prediction.
    pub fn set_difficulty(&mut self, profile: DifficultyProfile) {
        info!(profile = %profile.name, "difficulty changed");
        self.profile = profile;
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    /// Run one inference pass over a single-frame observation.
    pub fn predict(&mut self, observation: &[f32]) -> Result<Prediction> {
        if observation.len() != FEATURES {
            return Err(PolicyError::ProtocolError(format!(
                "observation must have {} features, got {}",
                FEATURES,
                observation.len()
            )));
        }

        self.stack.push(observation);
        let window = self.normalizer.normalize(self.stack.as_slice());
        let latents = self.backbone.forward(&window)?;

        let logits = self.heads.logits(&latents.actor);
        let confidence = self.heads.value(&latents.critic);
        let probabilities = math::softmax(&logits, self.profile.temperature);

        let index = if self.profile.deterministic {
            math::argmax(&logits)
        } else {
            let draw: f32 = self.rng.random();
            math::sample_categorical(&probabilities, draw)
        };
        let action = FightAction::from_index(index)
            .ok_or_else(|| PolicyError::ComputeFailure(format!("action index {index} out of range")))?;

        let token = self.next_token;
        self.next_token = token.next();
        self.cached = Some((token, self.stack.as_slice().to_vec()));

        Ok(Prediction {
            action,
            confidence,
            probabilities,
            token,
        })
    }

    /// Pair an action/reward with the stack cached for `token` and
    /// append it to replay memory.
    ///
    /// A token that does not match the cached prediction (none yet, or
    /// superseded by a later prediction while the reaction-delayed
    /// action was still queued) stores nothing.
    pub fn store_experience(
        &mut self,
        token: PredictionToken,
        action: FightAction,
        reward: f32,
        done: bool,
    ) -> Result<StoreOutcome> {
        let Some((cached_token, stack)) = &self.cached else {
            warn!("store_experience before any prediction, ignoring");
            return Ok(StoreOutcome::Ignored);
        };
        if *cached_token != token {
            warn!(
                expected = cached_token.0,
                got = token.0,
                "store_experience token mismatch, ignoring"
            );
            return Ok(StoreOutcome::Ignored);
        }

        self.replay.push(Experience {
            stack: stack.clone(),
            action: action.index(),
            reward,
            done,
        });
        self.inserts += 1;
        let len = self.replay.len();
        if self.inserts % self.config.stats_interval as u64 == 0 {
            Ok(StoreOutcome::StatsDue { len })
        } else {
            Ok(StoreOutcome::Stored { len })
        }
    }

    /// Run a training pass and persist the updated heads.
    ///
    /// With fewer than the minimum records this is a reported no-op:
    /// parameters, optimizer state, and replay memory stay untouched.
    pub fn train<F: FnMut(usize, usize)>(&mut self, progress: F) -> Result<TrainReport> {
        let report = trainer::run(
            &self.backbone,
            &self.normalizer,
            &mut self.heads,
            &mut self.adam,
            &self.replay,
            &self.config.train,
            &mut self.rng,
            progress,
        )?;
        self.store.save(&self.heads)?;
        Ok(report)
    }

    /// Return the heads to the backbone's pre-trained baseline and
    /// delete the persisted record.
    pub fn reset_weights(&mut self) -> Result<()> {
        self.heads = PolicyHeads::from_backbone(&self.backbone);
        self.adam = Adam::new(self.config.train.learning_rate, &self.heads);
        self.store.delete()?;
        info!("head weights reset to baseline");
        Ok(())
    }

    /// Clear cross-round temporal context: frame stack and the cached
    /// prediction stack. Round boundaries are an explicit signal, not
    /// an inherited ambiguity.
    pub fn reset_episode(&mut self) {
        self.stack.reset();
        self.cached = None;
    }

    /// Current raw frame-stack window (empty before the first predict).
    pub fn current_stack(&self) -> &[f32] {
        self.stack.as_slice()
    }

    pub fn replay_len(&self) -> usize {
        self.replay.len()
    }

    /// Trainable head parameters (read-only).
    pub fn heads(&self) -> &PolicyHeads {
        &self.heads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    /// Backbone whose actor latent is the oldest frame's first 9
    /// features and whose critic latent is the stack mean; with
    /// identity heads the logits are directly controllable from the
    /// observation.
    fn write_test_assets(dir: &Path) {
        let input = FEATURES * STACK;
        let actor_weights: Vec<Vec<f32>> = (0..input)
            .map(|i| (0..9).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        let critic_weights: Vec<Vec<f32>> = (0..input).map(|_| vec![1.0 / input as f32]).collect();
        let action_net: Vec<Vec<f32>> = (0..9)
            .map(|i| (0..9).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
            .collect();
        let doc = json!({
            "input_dim": input,
            "actor_trunk": [
                {"weights": actor_weights, "bias": vec![0.0; 9], "activation": "linear"}
            ],
            "critic_trunk": [
                {"weights": critic_weights, "bias": [0.0], "activation": "linear"}
            ],
            "params": {
                "action_net": {"weights": action_net, "bias": vec![0.0; 9]},
                "value_net": {"weights": [[1.0]], "bias": [0.0]}
            }
        });
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join("backbone.json"), doc.to_string()).unwrap();
        let stats = json!({
            "mean": vec![0.0; FEATURES],
            "variance": vec![1.0; FEATURES],
            "epsilon": 0.0
        });
        std::fs::write(dir.join("norm_stats.json"), stats.to_string()).unwrap();
    }

    fn test_engine(tag: &str) -> (PolicyEngine, EngineConfig) {
        let root = std::env::temp_dir().join(format!(
            "nemesis-engine-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&root);
        let assets = root.join("assets");
        write_test_assets(&assets);
        let config = EngineConfig::new(&assets, root.join("data"));
        let engine =
            PolicyEngine::init_with_rng(config.clone(), StdRng::seed_from_u64(42)).unwrap();
        (engine, config)
    }

    fn obs_with_peak(peak: usize) -> Vec<f32> {
        let mut obs = vec![0.0; FEATURES];
        obs[peak] = 1.0;
        obs
    }

    #[test]
    fn first_prediction_primes_the_stack() {
        let (mut engine, _) = test_engine("prime");
        let obs: Vec<f32> = (0..FEATURES).map(|i| i as f32 * 0.01).collect();
        engine.predict(&obs).unwrap();

        let expected: Vec<f32> = obs.iter().copied().cycle().take(FEATURES * STACK).collect();
        assert_eq!(engine.current_stack(), &expected[..]);
    }

    #[test]
    fn fourth_prediction_holds_last_four_frames() {
        let (mut engine, _) = test_engine("window");
        let frames: Vec<Vec<f32>> = (0..4).map(|k| vec![k as f32 * 0.1; FEATURES]).collect();
        for frame in &frames {
            engine.predict(frame).unwrap();
        }
        let expected: Vec<f32> = frames.concat();
        assert_eq!(engine.current_stack(), &expected[..]);
    }

    #[test]
    fn deterministic_mode_takes_argmax_lowest_index_on_ties() {
        let (mut engine, _) = test_engine("argmax");
        engine.set_difficulty(DifficultyProfile::hard());

        // Logits equal the oldest frame's first 9 features; two equal
        // maxima at indices 2 and 5.
        let mut obs = vec![0.0; FEATURES];
        obs[2] = 1.0;
        obs[5] = 1.0;
        let prediction = engine.predict(&obs).unwrap();
        assert_eq!(prediction.action, FightAction::Right);
    }

    #[test]
    fn stochastic_mode_converges_to_softmax() {
        let (mut engine, _) = test_engine("stochastic");
        engine.set_difficulty(DifficultyProfile::medium());

        let obs = obs_with_peak(6);
        // Prime; afterwards the stack (and thus the distribution) is
        // stationary under the same observation.
        let first = engine.predict(&obs).unwrap();
        let expected = first.probabilities.clone();

        let trials = 20_000usize;
        let mut counts = [0usize; 9];
        for _ in 0..trials {
            let p = engine.predict(&obs).unwrap();
            counts[p.action.index()] += 1;
        }
        for (i, &c) in counts.iter().enumerate() {
            let freq = c as f32 / trials as f32;
            assert!(
                (freq - expected[i]).abs() < 0.02,
                "action {i}: freq {freq} vs p {}",
                expected[i]
            );
        }
    }

    #[test]
    fn wrong_observation_length_is_rejected() {
        let (mut engine, _) = test_engine("len");
        let err = engine.predict(&[0.0; 3]).unwrap_err();
        assert!(matches!(err, PolicyError::ProtocolError(_)));
    }

    #[test]
    fn store_without_prediction_is_ignored() {
        let (mut engine, _) = test_engine("nostack");
        let outcome = engine
            .store_experience(PredictionToken(0), FightAction::Idle, 1.0, false)
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Ignored);
        assert_eq!(engine.replay_len(), 0);
    }

    #[test]
    fn stale_token_is_ignored() {
        let (mut engine, _) = test_engine("stale");
        let old = engine.predict(&obs_with_peak(0)).unwrap();
        let new = engine.predict(&obs_with_peak(1)).unwrap();

        let outcome = engine
            .store_experience(old.token, old.action, 0.5, false)
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Ignored);

        let outcome = engine
            .store_experience(new.token, new.action, 0.5, false)
            .unwrap();
        assert!(matches!(outcome, StoreOutcome::Stored { len: 1 }));
    }

    #[test]
    fn stats_due_every_interval() {
        let (mut engine, _) = test_engine("stats");
        let obs = obs_with_peak(3);
        let mut stats_events = 0;
        for _ in 0..250 {
            let p = engine.predict(&obs).unwrap();
            match engine
                .store_experience(p.token, p.action, 0.0, false)
                .unwrap()
            {
                StoreOutcome::StatsDue { .. } => stats_events += 1,
                StoreOutcome::Stored { .. } => {}
                StoreOutcome::Ignored => panic!("valid token ignored"),
            }
        }
        assert_eq!(stats_events, 2); // at 100 and 200
    }

    #[test]
    fn train_persists_and_reload_resumes() {
        let (mut engine, config) = test_engine("persist");
        let obs = obs_with_peak(4);
        for _ in 0..40 {
            let p = engine.predict(&obs).unwrap();
            engine
                .store_experience(p.token, p.action, 1.0, false)
                .unwrap();
        }
        let report = engine.train(|_, _| {}).unwrap();
        assert_eq!(report.iterations, 5);
        let trained = engine.heads().clone();

        // Fresh engine over the same data dir resumes the weights.
        let reloaded =
            PolicyEngine::init_with_rng(config, StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(reloaded.heads(), &trained);
    }

    #[test]
    fn insufficient_data_reports_and_mutates_nothing() {
        let (mut engine, _) = test_engine("insufficient");
        let obs = obs_with_peak(2);
        for _ in 0..10 {
            let p = engine.predict(&obs).unwrap();
            engine
                .store_experience(p.token, p.action, 0.1, false)
                .unwrap();
        }
        let before = engine.heads().clone();
        let err = engine.train(|_, _| {}).unwrap_err();
        assert!(matches!(err, PolicyError::InsufficientData { have: 10, need: 32 }));
        assert_eq!(engine.heads(), &before);
        assert_eq!(engine.replay_len(), 10);
    }

    #[test]
    fn reset_weights_restores_baseline_logits() {
        let (mut engine, _) = test_engine("reset");
        engine.set_difficulty(DifficultyProfile::hard());
        let obs = obs_with_peak(1);

        let baseline = engine.predict(&obs).unwrap();
        for _ in 0..40 {
            let p = engine.predict(&obs).unwrap();
            engine
                .store_experience(p.token, p.action, 1.0, false)
                .unwrap();
        }
        engine.train(|_, _| {}).unwrap();
        let after_training = engine.predict(&obs).unwrap();
        assert_ne!(baseline.probabilities, after_training.probabilities);

        engine.reset_weights().unwrap();
        let after_reset = engine.predict(&obs).unwrap();
        for (a, b) in baseline
            .probabilities
            .iter()
            .zip(&after_reset.probabilities)
        {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn reset_episode_clears_context() {
        let (mut engine, _) = test_engine("episode");
        let p = engine.predict(&obs_with_peak(0)).unwrap();
        engine.reset_episode();
        assert!(engine.current_stack().is_empty());
        // The cached stack is gone with the episode.
        let outcome = engine
            .store_experience(p.token, p.action, 0.0, true)
            .unwrap();
        assert_eq!(outcome, StoreOutcome::Ignored);

        let obs = obs_with_peak(7);
        engine.predict(&obs).unwrap();
        let expected: Vec<f32> = obs.iter().copied().cycle().take(FEATURES * STACK).collect();
        assert_eq!(engine.current_stack(), &expected[..]);
    }
}
