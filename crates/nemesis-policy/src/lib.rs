//! # nemesis-policy
//!
//! The online-learning policy engine. A frozen, pre-trained feature
//! extractor (the backbone) turns frame-stacked observations into actor
//! and critic latents; small trainable affine heads map those latents
//! to action logits and a value estimate. Experience gathered during
//! play is held in a bounded FIFO replay memory and periodically
//! consumed by an advantage actor-critic update that touches only the
//! heads, which are then persisted across sessions.
//!
//! The engine is synchronous and single-owner; `nemesis-worker` wraps
//! it in a message-driven service.

pub mod adam;
pub mod backbone;
pub mod engine;
pub mod heads;
pub mod math;
pub mod normalize;
pub mod replay;
pub mod stack;
pub mod store;
pub mod trainer;

pub use adam::{Adam, HeadGradients};
pub use backbone::{Backbone, Latents};
pub use engine::{EngineConfig, PolicyEngine, Prediction};
pub use heads::PolicyHeads;
pub use normalize::{NormStats, Normalizer};
pub use replay::ReplayMemory;
pub use stack::FrameStack;
pub use store::{SavedWeights, WeightStore};
pub use trainer::{LossBreakdown, TrainConfig, TrainReport};
