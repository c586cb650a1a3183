//! Adam optimizer over the four head tensors
//!
//! First/second moment estimates with bias correction, one shared step
//! counter. The backbone carries no moments because it is never
//! updated.

use crate::heads::PolicyHeads;

/// Learning rate used by the online fine-tuning loop.
pub const LEARNING_RATE: f32 = 3e-4;

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Gradients of the total loss with respect to the head parameters,
/// shaped exactly like [`PolicyHeads`].
#[derive(Debug, Clone)]
pub struct HeadGradients {
    pub actor_weights: Vec<Vec<f32>>,
    pub actor_bias: Vec<f32>,
    pub critic_weights: Vec<Vec<f32>>,
    pub critic_bias: Vec<f32>,
}

impl HeadGradients {
    /// All-zero gradients matching the head shapes.
    pub fn zeros_like(heads: &PolicyHeads) -> Self {
        Self {
            actor_weights: heads
                .actor_weights
                .iter()
                .map(|row| vec![0.0; row.len()])
                .collect(),
            actor_bias: vec![0.0; heads.actor_bias.len()],
            critic_weights: heads
                .critic_weights
                .iter()
                .map(|row| vec![0.0; row.len()])
                .collect(),
            critic_bias: vec![0.0; heads.critic_bias.len()],
        }
    }
}

#[derive(Debug, Clone)]
struct Moments {
    m: Vec<f32>,
    v: Vec<f32>,
}

impl Moments {
    fn new(len: usize) -> Self {
        Self {
            m: vec![0.0; len],
            v: vec![0.0; len],
        }
    }
}

/// Adam state for the trainable heads.
#[derive(Debug, Clone)]
pub struct Adam {
    lr: f32,
    step: u64,
    actor_w: Moments,
    actor_b: Moments,
    critic_w: Moments,
    critic_b: Moments,
}

impl Adam {
    pub fn new(lr: f32, heads: &PolicyHeads) -> Self {
        Self {
            lr,
            step: 0,
            actor_w: Moments::new(flat_len(&heads.actor_weights)),
            actor_b: Moments::new(heads.actor_bias.len()),
            critic_w: Moments::new(flat_len(&heads.critic_weights)),
            critic_b: Moments::new(heads.critic_bias.len()),
        }
    }

    /// Apply one update step to the heads in place.
    pub fn step(&mut self, heads: &mut PolicyHeads, grads: &HeadGradients) {
        self.step += 1;
        let t = self.step as i32;
        let bc1 = 1.0 - BETA1.powi(t);
        let bc2 = 1.0 - BETA2.powi(t);
        let lr = self.lr;

        update_matrix(&mut self.actor_w, &mut heads.actor_weights, &grads.actor_weights, lr, bc1, bc2);
        update_vector(&mut self.actor_b, &mut heads.actor_bias, &grads.actor_bias, lr, bc1, bc2);
        update_matrix(&mut self.critic_w, &mut heads.critic_weights, &grads.critic_weights, lr, bc1, bc2);
        update_vector(&mut self.critic_b, &mut heads.critic_bias, &grads.critic_bias, lr, bc1, bc2);
    }

    pub fn step_count(&self) -> u64 {
        self.step
    }
}

fn flat_len(m: &[Vec<f32>]) -> usize {
    m.iter().map(Vec::len).sum()
}

fn update_element(moments: (&mut f32, &mut f32), param: &mut f32, grad: f32, lr: f32, bc1: f32, bc2: f32) {
    let (m, v) = moments;
    *m = BETA1 * *m + (1.0 - BETA1) * grad;
    *v = BETA2 * *v + (1.0 - BETA2) * grad * grad;
    let m_hat = *m / bc1;
    let v_hat = *v / bc2;
    *param -= lr * m_hat / (v_hat.sqrt() + EPSILON);
}

fn update_vector(moments: &mut Moments, params: &mut [f32], grads: &[f32], lr: f32, bc1: f32, bc2: f32) {
    for (i, (p, &g)) in params.iter_mut().zip(grads).enumerate() {
        update_element((&mut moments.m[i], &mut moments.v[i]), p, g, lr, bc1, bc2);
    }
}

fn update_matrix(
    moments: &mut Moments,
    params: &mut [Vec<f32>],
    grads: &[Vec<f32>],
    lr: f32,
    bc1: f32,
    bc2: f32,
) {
    let mut k = 0;
    for (prow, grow) in params.iter_mut().zip(grads) {
        for (p, &g) in prow.iter_mut().zip(grow) {
            update_element((&mut moments.m[k], &mut moments.v[k]), p, g, lr, bc1, bc2);
            k += 1;
        }
    }
}
