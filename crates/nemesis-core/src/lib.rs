//! # nemesis-core
//!
//! Shared types for the Nemesis online-learning fight AI.
//!
//! This crate provides the foundational types used across the policy
//! engine and the worker service:
//! - Observation vectors and the feature layout contract
//! - The discrete fight-action space
//! - Experience records and prediction tokens
//! - Difficulty profiles
//! - The error taxonomy

pub mod action;
pub mod difficulty;
pub mod error;
pub mod experience;
pub mod observation;

pub use action::FightAction;
pub use difficulty::DifficultyProfile;
pub use error::{PolicyError, Result};
pub use experience::{Experience, PredictionToken};
pub use observation::{FEATURES, ObsVector, STACK, STACKED_LEN};
