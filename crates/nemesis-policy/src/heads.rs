//! Trainable policy heads
//!
//! The only parameters that change at runtime: two affine maps from the
//! frozen latents to action logits and to the scalar value estimate.

use crate::backbone::Backbone;
use crate::math;
use nemesis_core::FightAction;

/// Actor and critic head parameters.
///
/// `actor_weights` is latent×actions, `critic_weights` latent×1, both
/// in the same row-major input×output convention as the backbone.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyHeads {
    pub actor_weights: Vec<Vec<f32>>,
    pub actor_bias: Vec<f32>,
    pub critic_weights: Vec<Vec<f32>>,
    pub critic_bias: Vec<f32>,
}

impl PolicyHeads {
    /// Seed the heads from the backbone's pre-trained initializers.
    pub fn from_backbone(backbone: &Backbone) -> Self {
        let actor = backbone.actor_head();
        let critic = backbone.critic_head();
        Self {
            actor_weights: actor.weights.clone(),
            actor_bias: actor.bias.clone(),
            critic_weights: critic.weights.clone(),
            critic_bias: critic.bias.clone(),
        }
    }

    /// Per-action logits from the actor latent.
    pub fn logits(&self, actor_latent: &[f32]) -> Vec<f32> {
        math::affine(actor_latent, &self.actor_weights, &self.actor_bias)
    }

    /// Scalar value estimate from the critic latent.
    pub fn value(&self, critic_latent: &[f32]) -> f32 {
        math::affine(critic_latent, &self.critic_weights, &self.critic_bias)[0]
    }

    /// Whether shapes line up with the backbone and action space.
    pub fn compatible_with(&self, backbone: &Backbone) -> bool {
        self.actor_weights.len() == backbone.actor_latent_dim()
            && self.actor_bias.len() == FightAction::COUNT
            && self
                .actor_weights
                .iter()
                .all(|row| row.len() == FightAction::COUNT)
            && self.critic_weights.len() == backbone.critic_latent_dim()
            && self.critic_bias.len() == 1
            && self.critic_weights.iter().all(|row| row.len() == 1)
    }
}
