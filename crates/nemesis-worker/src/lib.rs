//! # nemesis-worker
//!
//! Message-driven worker service wrapping the Nemesis policy engine.
//!
//! This crate provides:
//! - The simulator ↔ worker wire protocol
//! - A single-consumer worker task owning the engine
//! - A caller handle with request/response and push-event channels
//! - Length-prefixed stdio framing for the worker binary

pub mod framing;
pub mod protocol;
pub mod service;

pub use protocol::{WorkerRequest, WorkerResponse};
pub use service::{WorkerHandle, spawn};
