//! Frozen feature-extractor backbone
//!
//! The backbone is exported offline from the trained actor-critic
//! policy as a JSON graph document: two tanh MLP trunks (actor and
//! critic) plus a named parameter table carrying the pre-trained head
//! initializers. It is loaded once, validated hard, and never updated
//! at runtime.
//!
//! The forward pass takes exactly one example. The export pipeline
//! fixes the batch dimension at 1, and the training path has to loop
//! over records rather than batch them; see `trainer::extract_latents`.

use crate::math;
use nemesis_core::{PolicyError, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Identifier of the pre-trained actor head in the parameter table.
pub const ACTOR_HEAD_ID: &str = "action_net";

/// Identifier of the pre-trained critic head in the parameter table.
pub const CRITIC_HEAD_ID: &str = "value_net";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Activation {
    Tanh,
    Linear,
}

#[derive(Debug, Clone, Deserialize)]
struct LayerDoc {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    activation: Activation,
}

#[derive(Debug, Clone, Deserialize)]
struct ParamDoc {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct BackboneDoc {
    input_dim: usize,
    actor_trunk: Vec<LayerDoc>,
    critic_trunk: Vec<LayerDoc>,
    params: HashMap<String, ParamDoc>,
}

/// One dense layer of a trunk.
#[derive(Debug, Clone)]
struct Layer {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
    activation: Activation,
}

/// Pre-trained affine parameters for one head, as exported.
#[derive(Debug, Clone)]
pub struct HeadInit {
    pub weights: Vec<Vec<f32>>,
    pub bias: Vec<f32>,
}

/// Actor and critic latent vectors for one example.
#[derive(Debug, Clone)]
pub struct Latents {
    pub actor: Vec<f32>,
    pub critic: Vec<f32>,
}

/// The frozen feature extractor.
#[derive(Debug, Clone)]
pub struct Backbone {
    input_dim: usize,
    actor_trunk: Vec<Layer>,
    critic_trunk: Vec<Layer>,
    actor_head: HeadInit,
    critic_head: HeadInit,
}

impl Backbone {
    /// Load and validate the graph document from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            PolicyError::InitializationFailure(format!(
                "failed to read backbone {}: {e}",
                path.display()
            ))
        })?;
        let backbone = Self::from_json(&raw)?;
        info!(
            input_dim = backbone.input_dim,
            actor_latent = backbone.actor_latent_dim(),
            critic_latent = backbone.critic_latent_dim(),
            "backbone loaded"
        );
        Ok(backbone)
    }

    /// Parse and validate a graph document.
    ///
    /// Head parameters are looked up by fixed identifier, not inferred
    /// from shapes; a missing identifier is a hard init failure.
    pub fn from_json(raw: &str) -> Result<Self> {
        let doc: BackboneDoc = serde_json::from_str(raw).map_err(|e| {
            PolicyError::InitializationFailure(format!("failed to parse backbone graph: {e}"))
        })?;

        let actor_out = validate_trunk("actor", doc.input_dim, &doc.actor_trunk)?;
        let critic_out = validate_trunk("critic", doc.input_dim, &doc.critic_trunk)?;

        let actor_head = take_param(&doc.params, ACTOR_HEAD_ID, actor_out, None)?;
        let critic_head = take_param(&doc.params, CRITIC_HEAD_ID, critic_out, Some(1))?;

        let to_layer = |d: LayerDoc| Layer {
            weights: d.weights,
            bias: d.bias,
            activation: d.activation,
        };
        Ok(Self {
            input_dim: doc.input_dim,
            actor_trunk: doc.actor_trunk.into_iter().map(to_layer).collect(),
            critic_trunk: doc.critic_trunk.into_iter().map(to_layer).collect(),
            actor_head,
            critic_head,
        })
    }

    /// Expected input length (features × stack depth).
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    pub fn actor_latent_dim(&self) -> usize {
        trunk_output_dim(&self.actor_trunk).unwrap_or(self.input_dim)
    }

    pub fn critic_latent_dim(&self) -> usize {
        trunk_output_dim(&self.critic_trunk).unwrap_or(self.input_dim)
    }

    /// Pre-trained actor head initializer.
    pub fn actor_head(&self) -> &HeadInit {
        &self.actor_head
    }

    /// Pre-trained critic head initializer.
    pub fn critic_head(&self) -> &HeadInit {
        &self.critic_head
    }

    /// Run the frozen trunks on a single normalized frame stack.
    pub fn forward(&self, input: &[f32]) -> Result<Latents> {
        if input.len() != self.input_dim {
            return Err(PolicyError::ComputeFailure(format!(
                "backbone expects {} inputs, got {}",
                self.input_dim,
                input.len()
            )));
        }
        Ok(Latents {
            actor: run_trunk(&self.actor_trunk, input),
            critic: run_trunk(&self.critic_trunk, input),
        })
    }
}

fn run_trunk(trunk: &[Layer], input: &[f32]) -> Vec<f32> {
    let mut x = input.to_vec();
    for layer in trunk {
        let mut z = math::affine(&x, &layer.weights, &layer.bias);
        if layer.activation == Activation::Tanh {
            for v in &mut z {
                *v = v.tanh();
            }
        }
        x = z;
    }
    x
}

fn trunk_output_dim(trunk: &[Layer]) -> Option<usize> {
    trunk.last().map(|l| l.bias.len())
}

/// Check layer shapes chain from `input_dim`; returns the output dim.
fn validate_trunk(name: &str, input_dim: usize, trunk: &[LayerDoc]) -> Result<usize> {
    let mut dim = input_dim;
    for (i, layer) in trunk.iter().enumerate() {
        let out = layer.bias.len();
        if layer.weights.len() != dim || layer.weights.iter().any(|row| row.len() != out) {
            return Err(PolicyError::InitializationFailure(format!(
                "{name} trunk layer {i}: expected {dim}x{out} weights"
            )));
        }
        dim = out;
    }
    Ok(dim)
}

fn take_param(
    params: &HashMap<String, ParamDoc>,
    id: &str,
    in_dim: usize,
    out_dim: Option<usize>,
) -> Result<HeadInit> {
    let param = params.get(id).ok_or_else(|| {
        PolicyError::InitializationFailure(format!("backbone parameter table is missing '{id}'"))
    })?;
    let out = param.bias.len();
    if param.weights.len() != in_dim || param.weights.iter().any(|row| row.len() != out) {
        return Err(PolicyError::InitializationFailure(format!(
            "parameter '{id}': expected {in_dim}x{out} weights"
        )));
    }
    if let Some(expected) = out_dim {
        if out != expected {
            return Err(PolicyError::InitializationFailure(format!(
                "parameter '{id}': expected {expected} outputs, got {out}"
            )));
        }
    }
    Ok(HeadInit {
        weights: param.weights.clone(),
        bias: param.bias.clone(),
    })
}
