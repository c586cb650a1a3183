//! Observation vector contract
//!
//! The simulator emits one observation per simulated frame. The layout
//! must match the environment the backbone was trained against:
//!
//! | idx | feature                         | range    |
//! |-----|---------------------------------|----------|
//! | 0   | dx (opponent x − self x) / W    | [-1, 1]  |
//! | 1   | dy (opponent y − self y) / H    | [-1, 1]  |
//! | 2   | self health / max               | [0, 1]   |
//! | 3   | opponent health / max           | [0, 1]   |
//! | 4   | self vx / 10                    | [-1, 1]  |
//! | 5   | self vy / 15                    | [-1, 1]  |
//! | 6   | opponent vx / 10                | [-1, 1]  |
//! | 7   | opponent vy / 15                | [-1, 1]  |
//! | 8   | self stunned                    | 0 or 1   |
//! | 9   | self attacking                  | 0 or 1   |
//! | 10  | self blocking                   | 0 or 1   |
//! | 11  | opponent stunned                | 0 or 1   |
//! | 12  | opponent attacking              | 0 or 1   |
//! | 13  | opponent blocking               | 0 or 1   |

/// Number of features in a single observation.
pub const FEATURES: usize = 14;

/// Number of observations stacked into one network input.
pub const STACK: usize = 4;

/// Length of a fully primed frame stack.
pub const STACKED_LEN: usize = FEATURES * STACK;

/// A single-frame observation emitted by the simulator.
///
/// Immutable once produced; malformed lengths are a caller contract
/// violation and are rejected at the engine boundary.
pub type ObsVector = Vec<f32>;
