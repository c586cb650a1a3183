//! Advantage actor-critic fine-tuning of the policy heads
//!
//! One `train` request runs a fixed number of iterations. Each
//! iteration samples a batch from replay memory, extracts latents
//! through the frozen backbone, and applies one Adam step to the heads.
//!
//! The heads are affine maps over frozen latents, so the backward pass
//! is closed-form; no gradient ever flows into the backbone, and the
//! advantage signal (reward − value) is computed outside the tracked
//! region so that it acts as a constant baseline.

use crate::adam::{Adam, HeadGradients, LEARNING_RATE};
use crate::backbone::{Backbone, Latents};
use crate::heads::PolicyHeads;
use crate::math::{self, LOG_EPS};
use crate::normalize::Normalizer;
use crate::replay::ReplayMemory;
use nemesis_core::{Experience, PolicyError, Result};
use rand::Rng;
use tracing::{debug, info};

/// Hyperparameters of the online update.
#[derive(Debug, Clone)]
pub struct TrainConfig {
    /// Adam steps per `train` request.
    pub iterations: usize,
    /// Upper bound on the sampled batch size.
    pub batch_cap: usize,
    /// Minimum records before training runs at all.
    pub min_records: usize,
    /// Weight of the critic MSE term.
    pub critic_weight: f32,
    /// Weight of the entropy bonus.
    pub entropy_weight: f32,
    /// Adam learning rate.
    pub learning_rate: f32,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            batch_cap: 64,
            min_records: 32,
            critic_weight: 0.5,
            entropy_weight: 0.01,
            learning_rate: LEARNING_RATE,
        }
    }
}

/// Loss terms of one batch.
#[derive(Debug, Clone, Copy)]
pub struct LossBreakdown {
    pub total: f32,
    pub actor: f32,
    pub critic: f32,
    pub entropy: f32,
}

/// Outcome of a completed training pass.
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub iterations: usize,
    pub batch_size: usize,
    pub last_loss: LossBreakdown,
}

/// Run the configured number of update iterations.
///
/// `progress` is invoked after each iteration with (current, total) so
/// callers can surface a progress indicator.
pub fn run<R: Rng, F: FnMut(usize, usize)>(
    backbone: &Backbone,
    normalizer: &Normalizer,
    heads: &mut PolicyHeads,
    adam: &mut Adam,
    replay: &ReplayMemory,
    config: &TrainConfig,
    rng: &mut R,
    mut progress: F,
) -> Result<TrainReport> {
    let have = replay.len();
    if have < config.min_records {
        return Err(PolicyError::InsufficientData {
            have,
            need: config.min_records,
        });
    }

    let batch_size = config.batch_cap.min(have);
    let mut last_loss = None;

    for iteration in 0..config.iterations {
        let batch = replay.sample(batch_size, rng);
        let latents = extract_latents(backbone, normalizer, &batch)?;
        let (loss, grads) = backward(heads, &latents, &batch, config);
        adam.step(heads, &grads);
        debug!(
            iteration = iteration + 1,
            total = config.iterations,
            loss = loss.total,
            actor = loss.actor,
            critic = loss.critic,
            entropy = loss.entropy,
            "training iteration"
        );
        last_loss = Some(loss);
        progress(iteration + 1, config.iterations);
    }

    // Loop ran at least once: iterations is fixed and nonzero.
    let last_loss = last_loss.ok_or_else(|| {
        PolicyError::ComputeFailure("training configured with zero iterations".into())
    })?;

    info!(
        iterations = config.iterations,
        batch_size,
        loss = last_loss.total,
        "training pass complete"
    );
    Ok(TrainReport {
        iterations: config.iterations,
        batch_size,
        last_loss,
    })
}

/// Batched latent extraction over the single-example backbone.
///
/// The exported graph fixes its batch dimension at 1, so batching has
/// to happen here, one forward pass per record. Keeping the loop behind
/// this function keeps the rest of the update agnostic to that
/// limitation.
pub fn extract_latents(
    backbone: &Backbone,
    normalizer: &Normalizer,
    batch: &[Experience],
) -> Result<Vec<Latents>> {
    batch
        .iter()
        .map(|record| backbone.forward(&normalizer.normalize(&record.stack)))
        .collect()
}

/// Advantage estimates for a batch, computed before the tracked
/// region so they act as constants during the update. Keeping the
/// baseline detached stops the advantage from chasing its own
/// gradient.
pub fn advantages(heads: &PolicyHeads, latents: &[Latents], batch: &[Experience]) -> Vec<f32> {
    batch
        .iter()
        .zip(latents)
        .map(|(record, latent)| record.reward - heads.value(&latent.critic))
        .collect()
}

/// Loss terms for a batch under the current heads, with the advantage
/// signal held fixed.
pub fn loss_terms(
    heads: &PolicyHeads,
    latents: &[Latents],
    batch: &[Experience],
    advantages: &[f32],
    config: &TrainConfig,
) -> LossBreakdown {
    let n = batch.len() as f32;
    let mut actor = 0.0;
    let mut critic = 0.0;
    let mut entropy = 0.0;

    for ((record, latent), &advantage) in batch.iter().zip(latents).zip(advantages) {
        let value = heads.value(&latent.critic);
        let logits = heads.logits(&latent.actor);
        let probs = math::softmax(&logits, 1.0);
        let picked = probs[record.action];

        actor += -(picked + LOG_EPS).ln() * advantage;
        critic += (record.reward - value) * (record.reward - value);
        entropy += math::entropy(&probs);
    }

    let actor = actor / n;
    let critic = critic / n;
    let entropy = entropy / n;
    LossBreakdown {
        total: actor + config.critic_weight * critic - config.entropy_weight * entropy,
        actor,
        critic,
        entropy,
    }
}

/// Loss terms and head gradients in one pass.
fn backward(
    heads: &PolicyHeads,
    latents: &[Latents],
    batch: &[Experience],
    config: &TrainConfig,
) -> (LossBreakdown, HeadGradients) {
    let n = batch.len() as f32;
    let advantages = advantages(heads, latents, batch);
    let mut grads = HeadGradients::zeros_like(heads);
    let mut actor_loss = 0.0;
    let mut critic_loss = 0.0;
    let mut entropy_sum = 0.0;

    for ((record, latent), &advantage) in batch.iter().zip(latents).zip(&advantages) {
        let value = heads.value(&latent.critic);
        let logits = heads.logits(&latent.actor);
        let probs = math::softmax(&logits, 1.0);
        let picked = probs[record.action];
        let h = math::entropy(&probs);

        actor_loss += -(picked + LOG_EPS).ln() * advantage;
        critic_loss += advantage * advantage;
        entropy_sum += h;

        // d total/d logit_j:
        //   actor term:   adv * (p_j − 1[j = a]) / n
        //   entropy term: ent_w * p_j * (ln p_j + H) / n
        for (j, &p) in probs.iter().enumerate() {
            let indicator = if j == record.action { 1.0 } else { 0.0 };
            let g = (advantage * (p - indicator)
                + config.entropy_weight * p * ((p + LOG_EPS).ln() + h))
                / n;
            for (i, &li) in latent.actor.iter().enumerate() {
                grads.actor_weights[i][j] += li * g;
            }
            grads.actor_bias[j] += g;
        }

        // d total/d value = critic_w * 2 (value − reward) / n
        let g_value = config.critic_weight * 2.0 * (value - record.reward) / n;
        for (i, &li) in latent.critic.iter().enumerate() {
            grads.critic_weights[i][0] += li * g_value;
        }
        grads.critic_bias[0] += g_value;
    }

    let actor = actor_loss / n;
    let critic = critic_loss / n;
    let entropy = entropy_sum / n;
    let loss = LossBreakdown {
        total: actor + config.critic_weight * critic - config.entropy_weight * entropy,
        actor,
        critic,
        entropy,
    };
    (loss, grads)
}
